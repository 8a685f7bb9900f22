//! Diagnostic sink: a process-wide verbosity level set once by the driver.

use std::sync::atomic::{AtomicU8, Ordering};

static DEBUG_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn set_debug_level(level: u8) {
    DEBUG_LEVEL.store(level.min(3), Ordering::SeqCst);
}

pub fn get_debug_level() -> u8 {
    DEBUG_LEVEL.load(Ordering::SeqCst)
}

/// Timestamped debug line, shown when the configured level reaches `level`.
pub fn debug_log(level: u8, msg: impl AsRef<str>) {
    if get_debug_level() >= level {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        println!("[{}] [DEBUG] {}", timestamp, msg.as_ref());
    }
}

/// Error line on stderr; the driver uses this right before exiting.
pub fn error_log(msg: impl AsRef<str>) {
    eprintln!("[!] {}", msg.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_capped_at_three() {
        set_debug_level(9);
        assert_eq!(get_debug_level(), 3);
        set_debug_level(0);
        assert_eq!(get_debug_level(), 0);
    }
}
