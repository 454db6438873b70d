use chain_hash::IndexedMap;
use chain_hash::Mapping;
use chain_hash::UniqueRefTable;
use clap::Parser;
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Table {
    Mapping,
    Indexed,
    Unique,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Which table to fill.
    #[arg(short = 't', long = "table", value_enum, default_value_t = Table::Mapping)]
    table: Table,

    /// Remove every n-th key after filling, then refill (0 disables).
    #[arg(short = 'r', long = "remove_every", default_value_t = 3)]
    remove_every: u64,
}

fn fill_mapping(args: &Args) {
    let mut map: Mapping<u64, u64> = Mapping::with_capacity(args.target_capacity);
    println!("Actual capacity: {}", map.capacity());

    let count = map.capacity() as u64;
    for i in 0..count {
        map.insert(i, i * 2);
    }
    println!("Inserted {} values", map.len());

    if args.remove_every > 0 {
        let removed = (0..count)
            .step_by(args.remove_every as usize)
            .filter(|k| map.remove(k).is_some())
            .count();
        println!("Removed {removed} values, refilling from the free list");
        for i in count..count + removed as u64 {
            map.insert(i, i * 2);
        }
        println!("Capacity after refill: {}", map.capacity());
    }

    map.stats().print();
}

fn fill_indexed(args: &Args) {
    let mut map: IndexedMap<u64, u64> = IndexedMap::with_capacity(args.target_capacity);
    println!("Actual capacity: {}", map.capacity());

    let count = map.capacity() as u64;
    for i in 0..count {
        map.insert(i, i * 2);
    }
    println!("Inserted {} values", map.len());

    if args.remove_every > 0 {
        for k in (0..count).step_by(args.remove_every as usize) {
            map.remove(&k);
        }
        println!("{} values left after swap-delete", map.len());
        if let Some((key, _)) = map.get_index(0) {
            println!("Position 0 now holds key {key}");
        }
    }

    map.stats().print();
}

fn fill_unique(args: &Args) {
    let values: Vec<u64> = (0..args.target_capacity as u64).collect();
    let mut seen = UniqueRefTable::with_capacity(args.target_capacity);
    println!("Actual capacity: {}", seen.capacity());

    for value in &values {
        seen.get_id(Some(value));
    }
    let repeats = values
        .iter()
        .filter(|&value| seen.get_id(Some(value)) < 0)
        .count();
    println!("Assigned {} ids, {repeats} repeat sightings", seen.len());

    seen.stats().print();
}

fn main() {
    let args = Args::parse();

    println!(
        "Filling {:?} with target capacity: {}",
        args.table, args.target_capacity
    );

    match args.table {
        Table::Mapping => fill_mapping(&args),
        Table::Indexed => fill_indexed(&args),
        Table::Unique => fill_unique(&args),
    }
}
