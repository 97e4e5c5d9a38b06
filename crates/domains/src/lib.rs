//! yell/crates/domains/src/lib.rs
//!
//! The central domain types and interface definitions for the board engine.

pub mod clock;
pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn test_root_post_detection() {
        let now = Utc::now();
        let root = Post {
            id: 1,
            content: "Hello Rust!".to_string(),
            pic: String::new(),
            on_thread: ROOT_THREAD,
            created: now,
            bumped: now,
        };
        let reply = Post {
            id: 2,
            on_thread: 1,
            ..root.clone()
        };
        assert!(root.is_root());
        assert!(!reply.is_root());
    }

    #[test]
    fn test_post_json_hides_bump_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let post = Post {
            id: 7,
            content: "hi".into(),
            pic: String::new(),
            on_thread: ROOT_THREAD,
            created: now,
            bumped: now,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["on_thread"], -1);
        assert!(json.get("bumped").is_none());
        assert!(json.get("delete_code").is_none());
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(TimeDelta::seconds(30));
        assert_eq!(clock.now(), start + TimeDelta::seconds(30));
    }

    #[test]
    fn test_deleted_post_root_flag() {
        assert!(DeletedPost { id: 3, on_thread: ROOT_THREAD }.was_root());
        assert!(!DeletedPost { id: 4, on_thread: 3 }.was_root());
    }
}
