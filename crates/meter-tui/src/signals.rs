//! Host signals turned into session events. The listeners never touch
//! session state themselves; they only send `Resize` / `Interrupt`.

use ratatui::crossterm::terminal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::SessionEvent;

pub fn spawn_signal_listeners(tx: mpsc::Sender<SessionEvent>) -> anyhow::Result<()> {
    let int_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("signals: cannot listen for Ctrl-C: {}", e);
                break;
            }
            debug!("signals: interrupt");
            if int_tx.send(SessionEvent::Interrupt).await.is_err() {
                break;
            }
        }
    });

    spawn_resize_listener(tx)?;
    Ok(())
}

#[cfg(unix)]
fn spawn_resize_listener(tx: mpsc::Sender<SessionEvent>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = signal(SignalKind::window_change())?;
    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            match terminal::size() {
                Ok((cols, _)) => {
                    if tx.send(SessionEvent::Resize(cols)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("signals: terminal size unavailable after resize: {}", e),
            }
        }
    });
    Ok(())
}

/// No SIGWINCH here; poll the width instead.
#[cfg(not(unix))]
fn spawn_resize_listener(tx: mpsc::Sender<SessionEvent>) -> anyhow::Result<()> {
    let mut last = terminal::size()?.0;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(250));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let Ok((cols, _)) = terminal::size() else {
                continue;
            };
            if cols != last {
                last = cols;
                if tx.send(SessionEvent::Resize(cols)).await.is_err() {
                    break;
                }
            }
        }
    });
    Ok(())
}
