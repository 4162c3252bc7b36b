use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{info, warn};

use tablefill_generate::FillControl;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a key press asks the running fill to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Skip,
    Abort,
}

pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Abort)
        }
        KeyCode::Char('n') | KeyCode::Char('N') => Some(KeyAction::Skip),
        _ => None,
    }
}

/// Background thread reading keys in raw mode while a fill runs.
///
/// Dropping the listener stops the thread and restores the terminal.
pub struct KeyListener {
    stop: Arc<AtomicBool>,
    raw_mode: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyListener {
    /// Start listening; a no-op when stdin is not a terminal.
    pub fn start(control: FillControl, raw_mode: Arc<AtomicBool>) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        if !io::stdin().is_terminal() {
            return Ok(Self {
                stop,
                raw_mode,
                handle: None,
            });
        }

        enable_raw_mode()?;
        raw_mode.store(true, Ordering::SeqCst);
        info!("press n to skip the current table, ctrl+c to abort");

        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || listen(&control, &thread_stop));
        Ok(Self {
            stop,
            raw_mode,
            handle: Some(handle),
        })
    }
}

fn listen(control: &FillControl, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, "key listener stopped");
                return;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "key listener stopped");
                return;
            }
        };
        match key_action(&key) {
            Some(KeyAction::Skip) => {
                info!("skip requested");
                control.skip_current_table();
            }
            Some(KeyAction::Abort) => {
                warn!("abort requested");
                control.abort();
            }
            None => {}
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            let _ = disable_raw_mode();
            self.raw_mode.store(false, Ordering::SeqCst);
        }
    }
}
