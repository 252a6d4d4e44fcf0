use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initializes the Snowflake ID generator.
///
/// `machine_id`: machine identifier (0-31)
/// `node_id`: node identifier (0-31)
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generates a time-ordered Snowflake ID. Monotonically increasing and
/// collision-free under single-writer discipline.
pub fn next_id() -> i64 {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id()
}
