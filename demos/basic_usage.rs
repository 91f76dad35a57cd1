//! Basic usage of the map types.

use hashid_map::{MapError, UnorderedManagedMap, UnorderedMap, UnorderedValueMap};

#[derive(Debug)]
struct Session {
    user: String,
    hits: u32,
}

fn main() -> Result<(), MapError> {
    let mut ports: UnorderedMap<String, u16> = UnorderedMap::new();
    ports.add("http".to_string(), 80)?;
    ports.add("https".to_string(), 443)?;
    ports.add("ssh".to_string(), 22)?;

    if let Err(e) = ports.add("ssh".to_string(), 2222) {
        println!("second ssh rejected: {e}");
    }

    println!("https -> {:?}", ports.get("https"));
    println!("http is at position {:?}", ports.find_index("http"));

    // Deleting the first record moves the last one into its place.
    ports.delete("http");
    println!("after delete: {ports:?}");
    println!("ssh is now at position {:?}", ports.find_index("ssh"));

    let stats = ports.index().stats();
    println!(
        "index: {} quick, {} buckets, {} overflows",
        stats.quick_entries, stats.collision_buckets, stats.overflow_count
    );

    let mut counters: UnorderedValueMap<&str, u64> = UnorderedValueMap::new();
    counters.change_or_add("requests", 1)?;
    counters.change_or_add("requests", 2)?;
    println!("requests = {}", counters.get_or(&"requests", 0));

    let mut sessions: UnorderedManagedMap<u64, Session> = UnorderedManagedMap::new();
    sessions.add_value(
        7,
        Session {
            user: "ada".to_string(),
            hits: 0,
        },
    )?;
    if let Some(s) = sessions.get_mut(&7) {
        s.hits += 1;
    }
    if let Some(session) = sessions.unlink(&7) {
        println!("handed back {} with {} hits", session.user, session.hits);
    }
    println!("sessions left: {}", sessions.len());

    Ok(())
}
