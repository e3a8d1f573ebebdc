//! Concurrency tests for the replay buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::test_utils::trajectory;
use crate::{ReplayBuffer, ReplayConfig};

#[test]
fn test_concurrent_producers_respect_capacity() {
    let buffer = Arc::new(ReplayBuffer::new(
        ReplayConfig::for_testing().with_capacity(500),
    ));

    let producers: Vec<_> = (0..4)
        .map(|worker| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for game in 0..25 {
                    buffer
                        .push(trajectory(&format!("w{worker}-g{game}"), 10))
                        .unwrap();
                    assert!(buffer.size() <= 500);
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }

    let stats = buffer.stats().unwrap();
    assert_eq!(buffer.size(), 500);
    assert_eq!(stats.pushed_trajectories, 100);
    assert_eq!(stats.pushed_steps, 1000);
    assert_eq!(stats.evicted_steps, 500);
    assert_eq!(stats.evicted_trajectories, 50);
    assert_eq!(stats.stored_trajectories, 50);
}

#[test]
fn test_sampling_during_pushes_sees_whole_trajectories() {
    let buffer = Arc::new(ReplayBuffer::new(
        ReplayConfig::for_testing().with_capacity(200),
    ));
    buffer.push(trajectory("seed", 10)).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let sampler = {
        let buffer = Arc::clone(&buffer);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut rng = ChaCha20Rng::seed_from_u64(17);
            let mut batches = 0;
            loop {
                for s in buffer.sample(16, &mut rng).unwrap() {
                    assert_eq!(s.trajectory.len(), 10);
                    assert!(s.key.position < 10);
                }
                batches += 1;
                if done.load(Ordering::Acquire) {
                    break;
                }
            }
            batches
        })
    };

    let producers: Vec<_> = (0..3)
        .map(|worker| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for game in 0..50 {
                    buffer
                        .push(trajectory(&format!("w{worker}-g{game}"), 10))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let batches = sampler.join().unwrap();

    assert!(batches > 0);
    assert_eq!(buffer.size(), 200);
}

#[test]
fn test_wait_for_fill_wakes_on_push() {
    let buffer = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));

    let producer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            buffer.push(trajectory("late", 12)).unwrap();
        })
    };

    let available = buffer
        .wait_for_fill(10, Duration::from_secs(5))
        .unwrap();
    assert_eq!(available, 12);
    producer.join().unwrap();
}
