//! A simple example showing the use of a scalable Bloom filter.
use sbloomy::{Growth, ScalableBloomFilter, SipBuildHasher};

fn main() -> Result<(), sbloomy::Error> {
    let capacity = 1000;
    let mut sbf = ScalableBloomFilter::with_growth(capacity, 0.05, Growth::Medium)?;

    sbf.insert(&String::from("foo"));
    sbf.insert(&String::from("bar"));

    sbf.contains(&String::from("foo")); // true
    sbf.contains(&String::from("bar")); // true
    sbf.contains(&String::from("baz")); // false

    for i in 0..10_000 {
        sbf.insert(&i.to_string());
    }
    println!("{} items in {} filters", sbf.len(), sbf.filter_count());

    // Persist the filter, then restore it with the same hash function.
    let state = sbf.to_state();
    let restored = ScalableBloomFilter::<String>::from_state(state, SipBuildHasher::default())?;
    assert!(restored.contains(&String::from("foo")));

    Ok(())
}
