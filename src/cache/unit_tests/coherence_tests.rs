use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cache::{
    AccessClass, CacheConfig, CoherenceEngine, LineState, LinePos, ReadOutcome,
    ReplacementPolicy, SimEvent, WriteOutcome,
};

fn tiny(num_cpu: usize) -> CacheConfig {
    CacheConfig {
        num_cpu,
        cache_size: 4,
        block_size: 1,
        associativity: 1,
        buffer_limit: 0,
        ..CacheConfig::default()
    }
}

fn engine(cfg: CacheConfig) -> CoherenceEngine {
    CoherenceEngine::new(cfg).unwrap()
}

#[test]
fn write_miss_installs_modified_then_read_hits_private() {
    let mut e = engine(tiny(1));
    assert_eq!(e.handle_write(0, 0), WriteOutcome::Miss);
    assert_eq!(e.state_of(0, 0), LineState::Modified);
    assert_eq!(e.handle_read(0, 0), ReadOutcome::Hit(AccessClass::Private));

    let stats = e.stats(0);
    assert_eq!(stats.write_misses(), 1);
    assert_eq!(stats.read_hits(), 1);
    assert_eq!(stats.ram_accesses(), 0);
    assert_eq!(e.access_stats().private(), 1);
    // probe + bus, then probe
    assert_eq!(e.counter(0), 2 + 20 + 2);
}

#[test]
fn read_miss_demotes_remote_modified_to_shared() {
    let mut e = engine(tiny(2));
    e.handle_write(0, 0);
    assert_eq!(e.handle_read(0, 1), ReadOutcome::Miss);
    assert_eq!(e.state_of(0, 0), LineState::Shared);
    assert_eq!(e.state_of(0, 1), LineState::Shared);
    // commit through the reader's write path, then the line fill
    assert_eq!(e.stats(1).ram_accesses(), 2);
    assert_eq!(e.counter(1), 2 + 200 + 20 + 200);
    assert_eq!(e.stats(1).invalidations(), 0);

    assert_eq!(
        e.handle_read(0, 1),
        ReadOutcome::Hit(AccessClass::SharedReadOnly)
    );
    assert_eq!(e.stats(1).read_misses(), 1);
    assert_eq!(e.stats(1).read_hits(), 1);
    assert!(e.coherence_violation().is_none());
}

#[test]
fn read_miss_with_write_back_skips_memory() {
    let cfg = CacheConfig {
        write_back: true,
        ..tiny(2)
    };
    let mut e = engine(cfg);
    e.handle_write(0, 0);
    assert_eq!(e.handle_read(0, 1), ReadOutcome::Miss);
    assert_eq!(e.state_of(0, 0), LineState::Shared);
    assert_eq!(e.stats(1).ram_accesses(), 0);
    assert_eq!(e.counter(1), 2 + 20);
}

#[test]
fn buffered_writes_overflow_once() {
    let cfg = CacheConfig {
        buffer_limit: 1,
        write_allocate: false,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    assert_eq!(e.handle_write(0, 0), WriteOutcome::Miss);
    assert_eq!(e.stats(0).ram_accesses(), 0);
    assert_eq!(e.handle_write(1, 0), WriteOutcome::Miss);
    assert_eq!(e.stats(0).ram_accesses(), 1);

    let entries: Vec<_> = e.write_buffer(0).entries().copied().collect();
    assert_eq!(entries, vec![LinePos { tag: 0, index: 1 }]);
    // no-allocate: nothing was installed
    assert_eq!(e.state_of(0, 0), LineState::Invalid);
    assert_eq!(e.counter(0), 22 + 22 + 200);
}

#[test]
fn read_after_buffered_write_is_forwarded() {
    let cfg = CacheConfig {
        buffer_limit: 4,
        write_allocate: false,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    e.handle_write(2, 0);
    let before = e.counter(0);
    assert_eq!(e.handle_read(2, 0), ReadOutcome::Bypassed);
    assert_eq!(e.counter(0), before + 1);
    assert_eq!(e.stats(0).reads(), 0);
    assert_eq!(e.access_stats().total(), 0);
}

#[test]
fn write_through_hit_goes_to_buffer() {
    let cfg = CacheConfig {
        buffer_limit: 4,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    e.handle_write(3, 0);
    assert!(e.write_buffer(0).is_empty());
    assert_eq!(e.handle_write(3, 0), WriteOutcome::Hit(AccessClass::Private));
    assert_eq!(e.stats(0).write_hits(), 1);
    assert_eq!(e.write_buffer(0).len(), 1);
}

#[test]
fn write_to_shared_copy_invalidates_others() {
    let mut e = engine(tiny(3));
    e.handle_read(1, 0);
    e.handle_read(1, 1);
    e.handle_read(1, 2);
    assert_eq!(
        e.handle_write(1, 0),
        WriteOutcome::Upgrade(AccessClass::SharedReadWrite)
    );
    assert_eq!(e.state_of(1, 0), LineState::Modified);
    assert_eq!(e.state_of(1, 1), LineState::Invalid);
    assert_eq!(e.state_of(1, 2), LineState::Invalid);
    assert_eq!(e.stats(0).invalidations(), 2);
    assert_eq!(e.stats(0).write_misses(), 1);
    assert_eq!(e.stats(0).write_hits(), 0);
    assert!(e.coherence_violation().is_none());
}

#[test]
fn sole_shared_copy_upgrade_is_private() {
    let mut e = engine(tiny(2));
    e.handle_read(1, 0);
    assert_eq!(
        e.handle_write(1, 0),
        WriteOutcome::Upgrade(AccessClass::Private)
    );
    assert_eq!(e.stats(0).invalidations(), 0);
}

#[test]
fn invalidated_reader_sees_coherence_miss() {
    let mut e = engine(tiny(2));
    e.handle_read(1, 0);
    e.handle_read(1, 1);
    e.handle_write(1, 0);
    assert_eq!(e.stats(1).coherence_misses(), 0);
    assert_eq!(e.handle_read(1, 1), ReadOutcome::Miss);
    assert_eq!(e.stats(1).coherence_misses(), 1);
    assert_eq!(e.state_of(1, 0), LineState::Shared);
    assert_eq!(e.state_of(1, 1), LineState::Shared);
    assert_eq!(e.stats(1).coherence_miss_rate(), Some(50.0));
}

#[test]
fn write_miss_commits_and_invalidates_remote_modified() {
    let cfg = CacheConfig {
        buffer_limit: 4,
        ..tiny(2)
    };
    let mut e = engine(cfg);
    e.handle_write(0, 0);
    assert_eq!(e.handle_write(0, 1), WriteOutcome::Miss);
    assert_eq!(e.state_of(0, 0), LineState::Invalid);
    assert_eq!(e.state_of(0, 1), LineState::Modified);
    assert_eq!(e.stats(1).invalidations(), 1);
    // the commit went through the writer's buffer
    assert_eq!(e.write_buffer(1).len(), 1);
}

#[test]
fn write_back_miss_commits_nothing() {
    let cfg = CacheConfig {
        buffer_limit: 4,
        write_back: true,
        ..tiny(2)
    };
    let mut e = engine(cfg);
    e.handle_write(0, 0);
    e.handle_write(0, 1);
    assert!(e.write_buffer(1).is_empty());
    assert_eq!(e.stats(1).invalidations(), 1);
}

#[test]
fn lru_evicts_least_recently_used_way() {
    let cfg = CacheConfig {
        associativity: 2,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    // addresses 0, 2, 4 share set 0
    e.handle_read(0, 0);
    e.handle_read(2, 0);
    e.handle_read(0, 0);
    e.handle_read(4, 0);
    assert_eq!(e.state_of(0, 0), LineState::Shared);
    assert_eq!(e.state_of(2, 0), LineState::Invalid);
    assert_eq!(e.state_of(4, 0), LineState::Shared);
}

#[test]
fn mru_evicts_most_recently_used_way() {
    let cfg = CacheConfig {
        associativity: 2,
        replacement: ReplacementPolicy::Mru,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    e.handle_read(0, 0);
    e.handle_read(2, 0);
    e.handle_read(0, 0);
    e.handle_read(4, 0);
    assert_eq!(e.state_of(0, 0), LineState::Invalid);
    assert_eq!(e.state_of(2, 0), LineState::Shared);
    assert_eq!(e.state_of(4, 0), LineState::Shared);
}

#[test]
fn install_prefers_free_way_over_policy() {
    let cfg = CacheConfig {
        associativity: 2,
        replacement: ReplacementPolicy::Mru,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    e.handle_read(0, 0);
    e.handle_read(2, 0);
    assert_eq!(e.state_of(0, 0), LineState::Shared);
    assert_eq!(e.state_of(2, 0), LineState::Shared);
}

#[test]
fn threshold_retirement_drains_buffer() {
    let cfg = CacheConfig {
        buffer_limit: 8,
        retire_threshold: 1,
        write_allocate: false,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    e.handle_write(0, 0);
    e.handle_write(1, 0);
    assert_eq!(e.write_buffer(0).len(), 2);
    e.handle_write(2, 0);
    // retired one entry on entry to the third write, then appended
    assert_eq!(e.write_buffer(0).len(), 2);
    assert_eq!(e.stats(0).ram_accesses(), 1);
    let entries: Vec<_> = e.write_buffer(0).entries().map(|p| p.index).collect();
    assert_eq!(entries, vec![1, 2]);
}

#[test]
fn events_describe_snoop_when_enabled() {
    let mut e = engine(tiny(2));
    e.events_mut().set_enabled(true);
    e.handle_write(1, 0);
    e.handle_read(1, 1);
    let events = e.events().events();
    assert!(events.contains(&SimEvent::SnoopDemote {
        cpu: 1,
        holder: 0,
        pos: LinePos { tag: 0, index: 1 },
    }));
    assert!(events.iter().any(|ev| matches!(ev, SimEvent::Bus { cpu: 1 })));
}

#[test]
fn events_are_not_collected_by_default() {
    let mut e = engine(tiny(2));
    e.handle_write(1, 0);
    assert!(e.events().is_empty());
}

#[test]
fn snapshot_reports_lines_and_buffer() {
    let cfg = CacheConfig {
        buffer_limit: 4,
        ..tiny(2)
    };
    let mut e = engine(cfg);
    e.handle_write(1, 0);
    e.handle_write(1, 0);
    let snap = e.snapshot();
    assert!(snap.write_buffer_enabled);
    assert_eq!(snap.cpus.len(), 2);
    assert_eq!(snap.cpus[0].sets.len(), 4);
    let line = snap.cpus[0].sets[1][0];
    assert_eq!(line.tag, Some(0));
    assert_eq!(line.state, LineState::Modified);
    assert_eq!(line.age, 0);
    assert_eq!(snap.cpus[0].write_buffer, vec![LinePos { tag: 0, index: 1 }]);
    assert!(snap.cpus[1].write_buffer.is_empty());
}

#[test]
fn sharing_histogram_counts_distinct_cpus() {
    let mut e = engine(tiny(3));
    e.handle_read(5, 0);
    e.handle_write(5, 1);
    e.handle_read(5, 1);
    e.handle_read(6, 2);
    let breadth = e.sharing().breadth();
    assert_eq!(breadth.two, 1);
    assert_eq!(breadth.one, 1);
    assert_eq!(breadth.many, 0);
}

#[test]
fn addresses_past_histogram_bound_are_still_simulated() {
    let cfg = CacheConfig {
        sharing_address_bound: 16,
        ..tiny(1)
    };
    let mut e = engine(cfg);
    assert_eq!(e.handle_read(100, 0), ReadOutcome::Miss);
    assert_eq!(e.stats(0).read_misses(), 1);
    assert_eq!(e.sharing().breadth().total(), 0);
}

fn check_invariants(e: &CoherenceEngine, step: usize) {
    assert_eq!(e.coherence_violation(), None, "after step {step}");
    for cpu in 0..e.num_cpu() {
        assert!(e.write_buffer(cpu).len() <= e.config().buffer_limit);
        for set in e.cache(cpu).sets() {
            let mut valid: Vec<u64> = set
                .ways()
                .iter()
                .filter(|line| line.state.is_valid())
                .filter_map(|line| line.tag)
                .collect();
            let before = valid.len();
            valid.sort_unstable();
            valid.dedup();
            assert_eq!(before, valid.len(), "duplicate valid tag in one set at step {step}");
        }
    }
}

#[test]
fn coherence_invariant_holds_on_random_traces() {
    let configs = [
        CacheConfig {
            num_cpu: 4,
            cache_size: 8,
            block_size: 2,
            ..CacheConfig::default()
        },
        CacheConfig {
            num_cpu: 3,
            cache_size: 8,
            block_size: 1,
            associativity: 2,
            write_back: true,
            prefetch_offset: 1,
            buffer_limit: 2,
            retire_threshold: 1,
            ..CacheConfig::default()
        },
        CacheConfig {
            num_cpu: 4,
            cache_size: 8,
            block_size: 4,
            associativity: 4,
            write_allocate: false,
            replacement: ReplacementPolicy::Random,
            prefetch_offset: 4,
            buffer_limit: 0,
            ..CacheConfig::default()
        },
        CacheConfig {
            num_cpu: 2,
            cache_size: 4,
            block_size: 1,
            associativity: 2,
            replacement: ReplacementPolicy::Mru,
            prefetch_offset: 3,
            ..CacheConfig::default()
        },
    ];
    for (i, cfg) in configs.into_iter().enumerate() {
        let mut e = engine(cfg);
        let mut rng = StdRng::seed_from_u64(i as u64);
        for step in 0..2000 {
            let cpu = rng.gen_range(0..cfg.num_cpu);
            let addr = rng.gen_range(0..64u64);
            if rng.gen_bool(0.4) {
                e.handle_write(addr, cpu);
            } else {
                e.handle_read(addr, cpu);
            }
            check_invariants(&e, step);
        }
    }
}
