use std::{
    io::{self, BufRead, BufReader},
    sync::mpsc::{self, Receiver},
    thread,
};

use log::{debug, info};

/// Watch stdin on a separate thread; the receiver gets a message once the
/// quit key has been typed (followed by Enter). A closed stdin only ends
/// the watch, since headless runs start without one.
pub fn spawn_quit_watcher(quit_key: char) -> Receiver<()> {
    info!("Type \"{}\" + Enter to quit", quit_key);
    spawn_quit_watcher_on(BufReader::new(io::stdin()), quit_key)
}

pub fn spawn_quit_watcher_on<R: BufRead + Send + 'static>(
    reader: R,
    quit_key: char,
) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if wait_for_quit(reader, quit_key) {
            let _ = tx.send(());
        }
    });
    rx
}

/// True if the quit key was typed before the input ended
fn wait_for_quit<R: BufRead>(reader: R, quit_key: char) -> bool {
    for line in reader.lines() {
        match line {
            Ok(l) if is_quit(&l, quit_key) => return true,
            Ok(_) => {}
            Err(e) => {
                debug!("stdin error: {}", e);
                return false;
            }
        }
    }
    debug!("stdin closed; quit key no longer available");
    false
}

fn is_quit(line: &str, quit_key: char) -> bool {
    let mut chars = line.trim().chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&quit_key))
}
