//! Example demonstrating the pool-backed second-chance cache.
//!
//! Stores two value types in one cache keyed by `str`, shows a hit, an
//! eviction with a requeue, and the pool's slot accounting.
//!
//! Run with: RUST_LOG=poolcache=debug cargo run --example basic_pool_cache

use poolcache::prelude::*;

/// Value keyed by the whole string.
#[derive(Debug)]
struct Word(String);

impl KeyProvider<str> for Word {
    fn from_key(key: &str) -> Self {
        Word(key.to_string())
    }

    fn matches(&self, key: &str) -> bool {
        self.0 == key
    }
}

/// Value keyed by the first letter, as its offset from 'a'.
#[derive(Debug)]
struct Letter(i32);

impl KeyProvider<str> for Letter {
    fn from_key(key: &str) -> Self {
        Letter(first_offset(key))
    }

    fn matches(&self, key: &str) -> bool {
        self.0 == first_offset(key)
    }
}

fn first_offset(key: &str) -> i32 {
    key.bytes().next().map_or(-1, |b| i32::from(b) - i32::from(b'a'))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("=== Raw Pool ===\n");

    let word = size_of::<Word>();
    let mut pool = PoolAllocator::new(4 * word, [word])?;
    let handles: Vec<_> = (0..4).map(|_| pool.allocate(word)).collect::<Result<_, _>>()?;
    println!("allocated 4 slots of {} bytes", word);
    println!("  next allocation: {:?}", pool.allocate(word).err());
    for handle in handles {
        pool.deallocate(handle)?;
    }
    println!("  used after release: {:?}\n", pool.used_slots(word));

    println!("=== Second-Chance Cache ===\n");

    let mut cache = CacheBuilder::new(3)
        .block_size(4 * word)
        .size_class_of::<Word>()
        .size_class_of::<Letter>()
        .build::<str>()?;

    cache.get::<Word>("apple")?;
    cache.get::<Letter>("banana")?;
    cache.get::<Word>("cherry")?;
    print!("filled:          {}", cache);

    cache.get::<Word>("apple")?;
    print!("apple hit:       {}", cache);

    // "blueberry" shares its first letter with the Letter entry
    println!("blueberry value: {:?}", cache.get::<Letter>("blueberry")?);

    cache.get::<Word>("date")?;
    print!("date inserted:   {}", cache);

    match cache.get::<Word>("berry") {
        Err(err) => println!("berry as Word:   {}", err),
        Ok(value) => println!("berry as Word:   {:?}", value),
    }

    let stats = cache.allocator().stats();
    println!(
        "\npool: {} of {} slots in use, cache len {}",
        stats.used_slots(),
        stats.total_slots(),
        cache.len()
    );

    cache.clear()?;
    println!("after clear: {} slots in use", cache.allocator().stats().used_slots());
    Ok(())
}
