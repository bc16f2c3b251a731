//! Shared test helpers for integration tests.
//!
//! Provides the embedded bridge loader and a family of WAT fixture guests.
//! Fixture guests log `alloc` / `free` through `env.log` every time their
//! allocator runs, so tests can see exactly which guest frees happened.

#![allow(dead_code)]

use guestfetch_hostapi::CaptureSink;
use guestfetch_sandbox::{Bridge, SandboxConfig, Session};

/// Largest request the fixture allocator grants.
pub const FIXTURE_ALLOC_LIMIT: u32 = 0x8000;

/// Echo message body: log the input.
pub const LOG_INPUT: &str = "(call $log (local.get $ptr) (local.get $len))";

/// Identity formatting body: copy the input into a new buffer.
pub const COPY_INPUT: &str = r#"
    (local.set $out (call $malloc (local.get $len)))
    (memory.copy (local.get $out) (local.get $ptr) (local.get $len))
    (i64.or
      (i64.shl (i64.extend_i32_u (local.get $out)) (i64.const 32))
      (i64.extend_i32_u (local.get $len)))
"#;

/// Build a fixture guest with the traced allocator and the given bodies.
///
/// `message` sees `$ptr`/`$len`; `formatting` sees `$ptr`/`$len` and a
/// scratch local `$out`, and must leave an i64 on the stack.
pub fn traced_guest(message: &str, formatting: &str) -> String {
    format!(
        r#"
(module
  (import "env" "log" (func $log (param i32 i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 200) "alloc")
  (data (i32.const 208) "free")
  (global $heap (mut i32) (i32.const 1024))

  (func $malloc (export "malloc") (param $size i32) (result i32)
    (local $block i32)
    (if (i32.eqz (local.get $size)) (then (return (i32.const 0))))
    (if (i32.gt_u (local.get $size) (i32.const {limit})) (then (return (i32.const 0))))
    (local.set $block (global.get $heap))
    (i32.store (local.get $block) (local.get $size))
    (i32.store offset=4 (local.get $block) (i32.const 0x0A110C8E))
    (global.set $heap
      (i32.add (local.get $block)
        (i32.and (i32.add (local.get $size) (i32.const 15)) (i32.const -8))))
    (call $log (i32.const 200) (i32.const 5))
    (i32.add (local.get $block) (i32.const 8)))

  (func (export "free") (param $ptr i32)
    (if (i32.lt_u (local.get $ptr) (i32.const 1032)) (then unreachable))
    (if (i32.ne (i32.load offset=4 (i32.sub (local.get $ptr) (i32.const 8))) (i32.const 0x0A110C8E))
      (then unreachable))
    (i32.store offset=4 (i32.sub (local.get $ptr) (i32.const 8)) (i32.const 0))
    (call $log (i32.const 208) (i32.const 4)))

  (func (export "message") (param $ptr i32) (param $len i32)
    {message})

  (func (export "formatting") (param $ptr i32) (param $len i32) (result i64)
    (local $out i32)
    {formatting})
)
"#,
        limit = FIXTURE_ALLOC_LIMIT,
        message = message,
        formatting = formatting,
    )
}

/// Load the embedded URL-building guest with default config.
pub fn load_bridge() -> Bridge {
    Bridge::embedded(SandboxConfig::default()).expect("embedded guest must load")
}

/// Load the embedded guest with a custom config.
pub fn load_bridge_with_config(config: SandboxConfig) -> Bridge {
    Bridge::embedded(config).expect("embedded guest must load with config")
}

/// Compile a WAT fixture with default config.
pub fn fixture_bridge(wat: &str) -> Bridge {
    Bridge::new(wat.as_bytes(), SandboxConfig::default()).expect("fixture guest must compile")
}

/// Open a session whose log lines are captured.
pub fn capture_session(bridge: &Bridge) -> (Session, CaptureSink) {
    let sink = CaptureSink::new();
    let session = bridge
        .session_with_sink(Box::new(sink.clone()))
        .expect("session must load");
    (session, sink)
}

/// Count captured lines equal to `marker`.
pub fn count_lines(sink: &CaptureSink, marker: &str) -> usize {
    sink.text_lines().iter().filter(|l| l.as_str() == marker).count()
}
