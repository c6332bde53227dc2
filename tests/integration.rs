//! Integration tests for tickflow
//!
//! Tests end-to-end behaviour of tasks, combinators and the manager the way
//! gameplay scripts use them: async bodies, nested waits, a manual clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tickflow::prelude::*;

/// Clock, dilation and the context built from them
fn manual_time(scale: f64) -> (ManualClock, TimeScale, TimeContext) {
    let clock = ManualClock::new();
    let scale = TimeScale::new(scale);
    let time = TimeContext::new(clock.clone(), scale.clone());
    (clock, scale, time)
}

/// `depth` nested async tasks, innermost finishing straight away
fn nested(depth: usize, trail: Rc<RefCell<Vec<usize>>>) -> Task {
    Task::from_future(move |co| async move {
        if depth > 1 {
            co.wait(nested(depth - 1, trail.clone())).await;
        }
        trail.borrow_mut().push(depth);
        Ok(())
    })
}

// ============================================================================
// Trampoline
// ============================================================================

#[test]
fn test_same_tick_trampoline_async() {
    for depth in [1, 2, 5] {
        let trail = Rc::new(RefCell::new(Vec::new()));
        let mut task = nested(depth, trail.clone());

        task.resume().unwrap();
        assert!(!task.is_valid(), "depth {depth} did not resolve in one resume");
        let expected: Vec<usize> = (1..=depth).collect();
        assert_eq!(*trail.borrow(), expected);
    }
}

#[test]
fn test_suspend_count_matches_resume_count() {
    let k = 4;
    let mut task = Task::from_future(move |co| async move {
        for _ in 0..k {
            co.suspend().await;
        }
        Ok(())
    });

    let mut resumes = 0;
    while task.is_valid() {
        task.resume().unwrap();
        resumes += 1;
    }
    assert_eq!(resumes, k + 1);
}

#[test]
fn test_finish_now_skips_rest_of_body() {
    let reached = Rc::new(Cell::new(false));
    let reached_clone = reached.clone();
    let mut task = Task::from_future(move |co| async move {
        co.suspend().await;
        co.signal(finish_now()).await;
        reached_clone.set(true);
        Ok(())
    });

    task.resume().unwrap();
    task.resume().unwrap();
    assert!(!task.is_valid());
    assert!(!reached.get());
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_close_unwinds_every_frame_once() {
    let cleanups = Rc::new(RefCell::new(Vec::new()));

    fn layer(name: &'static str, inner: Option<Task>, log: Rc<RefCell<Vec<&'static str>>>) -> Task {
        Task::from_future(move |co| async move {
            co.on_cancel(move || log.borrow_mut().push(name));
            match inner {
                Some(inner) => co.wait(inner).await,
                None => loop {
                    co.suspend().await;
                },
            }
            Ok(())
        })
    }

    let c2 = layer("c2", None, cleanups.clone());
    let c1 = layer("c1", Some(c2), cleanups.clone());
    let mut root = layer("root", Some(c1), cleanups.clone());

    root.resume().unwrap();
    root.resume().unwrap();
    assert_eq!(root.depth(), 3);

    root.close();
    assert!(!root.is_valid());
    assert_eq!(root.depth(), 0);
    assert_eq!(*cleanups.borrow(), vec!["c2", "c1", "root"]);

    root.close();
    root.resume().unwrap();
    assert_eq!(cleanups.borrow().len(), 3);
}

#[test]
fn test_state_switch_closes_previous_state() {
    // An enemy swaps its behaviour task when it takes damage
    let log = Rc::new(RefCell::new(Vec::new()));
    let (clock, _scale, time) = manual_time(1.0);

    let patrol_log = log.clone();
    let patrol_time = time.clone();
    let mut state = Task::from_future(move |co| async move {
        let exit_log = patrol_log.clone();
        co.on_cancel(move || exit_log.borrow_mut().push("patrol exit"));
        loop {
            patrol_log.borrow_mut().push("patrol step");
            co.wait(wait_seconds(0.5, &patrol_time)).await;
        }
    });

    clock.advance(0.1);
    state.resume().unwrap();

    state.close();
    let hurt_log = log.clone();
    state = Task::from_future(move |co| async move {
        hurt_log.borrow_mut().push("hurt");
        co.wait(wait_seconds(0.15, &time)).await;
        hurt_log.borrow_mut().push("recovered");
        Ok(())
    });

    for _ in 0..3 {
        clock.advance(0.1);
        state.resume().unwrap();
    }
    assert!(!state.is_valid());
    assert_eq!(
        *log.borrow(),
        vec!["patrol step", "patrol exit", "hurt", "recovered"]
    );
}

#[test]
fn test_dropping_task_runs_cleanup() {
    let cleaned = Rc::new(Cell::new(0));
    {
        let cleaned = cleaned.clone();
        let mut task = Task::from_future(move |co| async move {
            co.on_cancel(move || cleaned.set(cleaned.get() + 1));
            co.wait(wait_ticks(10)).await;
            Ok(())
        });
        task.resume().unwrap();
    }
    assert_eq!(cleaned.get(), 1);
}

// ============================================================================
// Combinators
// ============================================================================

#[test]
fn test_wait_until_completes_on_fourth_resume() {
    let counter = Rc::new(Cell::new(0));
    let watched = counter.clone();
    let mut task = wait_until(move || watched.get() >= 3);

    for expected_valid in [true, true, true, false] {
        task.resume().unwrap();
        assert_eq!(task.is_valid(), expected_valid);
        counter.set(counter.get() + 1);
    }
}

#[test]
fn test_awaiting_satisfied_wait_costs_no_tick() {
    let mut task = Task::from_future(|co| async move {
        co.wait(wait_until(|| true)).await;
        co.wait(wait_seconds(0.0, &TimeContext::wall())).await;
        Ok(())
    });
    task.resume().unwrap();
    assert!(!task.is_valid());
}

#[test]
fn test_wait_seconds_with_dilation() {
    let (clock, scale, time) = manual_time(0.0);
    let mut task = wait_seconds(1.0, &time);

    for _ in 0..10 {
        clock.advance(0.5);
        task.resume().unwrap();
    }
    assert!(task.is_valid());

    scale.set(1.0);
    clock.advance(0.5);
    task.resume().unwrap();
    assert!(task.is_valid());
    clock.advance(0.5);
    task.resume().unwrap();
    assert!(!task.is_valid());
}

#[test]
fn test_enemy_wait_scenario() {
    let (clock, _scale, time) = manual_time(1.0);
    let attacked = Rc::new(Cell::new(false));
    let attacked_clone = attacked.clone();
    // The wait starts counting when it is built, before the first tick
    let windup = wait_seconds(0.25, &time);
    let mut enemy = Task::from_future(move |co| async move {
        co.wait(windup).await;
        attacked_clone.set(true);
        co.finish().await;
        Ok(())
    });

    for _ in 0..2 {
        clock.advance(0.1);
        enemy.resume().unwrap();
        assert!(enemy.is_valid());
        assert!(!attacked.get());
    }

    clock.advance(0.1);
    enemy.resume().unwrap();
    assert!(!enemy.is_valid());
    assert!(attacked.get());
}

#[test]
fn test_wait_until_driven_by_sequence() {
    // Fade finishes after three ticks, then the level transition continues
    let faded = Rc::new(Cell::new(0));
    let fade_counter = faded.clone();
    let fade = Task::from_future(move |co| async move {
        for _ in 0..3 {
            fade_counter.set(fade_counter.get() + 1);
            co.suspend().await;
        }
        Ok(())
    });

    let mut transition = Task::from_future(move |co| async move {
        co.wait(wait_until(fade)).await;
        Ok(())
    });

    let mut resumes = 0;
    while transition.is_valid() {
        transition.resume().unwrap();
        resumes += 1;
    }
    assert_eq!(faded.get(), 3);
    assert_eq!(resumes, 4);
}

// ============================================================================
// Task manager
// ============================================================================

#[test]
fn test_manager_evicts_finished_task() {
    let resumes = Rc::new(RefCell::new(Vec::new()));
    let mut manager = TaskManager::new();

    let mut ids = Vec::new();
    for (name, finishes) in [("one", false), ("two", true), ("three", false)] {
        let resumes = resumes.clone();
        ids.push(manager.add(Task::from_future(move |co| async move {
            loop {
                resumes.borrow_mut().push(name);
                if finishes {
                    return Ok(());
                }
                co.suspend().await;
            }
        })));
    }

    manager.update().unwrap();
    assert_eq!(manager.ids(), vec![ids[0], ids[2]]);
    assert_eq!(*resumes.borrow(), vec!["one", "two", "three"]);

    manager.update().unwrap();
    assert_eq!(resumes.borrow().iter().filter(|&&n| n == "two").count(), 1);
}

#[test]
fn test_manager_close_all() {
    let cleaned = Rc::new(Cell::new(0));
    let mut manager = TaskManager::new();
    for _ in 0..4 {
        let cleaned = cleaned.clone();
        manager.add(Task::from_future(move |co| async move {
            co.on_cancel(move || cleaned.set(cleaned.get() + 1));
            co.wait(wait_ticks(100)).await;
            Ok(())
        }));
    }

    manager.update().unwrap();
    manager.close_all();
    assert!(manager.is_empty());
    assert_eq!(cleaned.get(), 4);
}

#[test]
fn test_spawned_projectile_joins_next_update() {
    let hits = Rc::new(Cell::new(0));
    let mut manager = TaskManager::new();
    let spawner = manager.spawner();

    let hits_clone = hits.clone();
    manager.add(Task::from_future(move |co| async move {
        spawner.spawn(Task::from_future(move |co| async move {
            co.wait(wait_ticks(1)).await;
            hits_clone.set(hits_clone.get() + 1);
            Ok(())
        }));
        co.suspend().await;
        Ok(())
    }));

    // Shooter runs and spawns; projectile is queued, not resumed
    assert_eq!(manager.update().unwrap(), 1);
    assert_eq!(manager.len(), 2);

    // Shooter finishes, projectile suspends once
    assert_eq!(manager.update().unwrap(), 2);
    assert_eq!(hits.get(), 0);

    // Projectile lands
    manager.update().unwrap();
    assert_eq!(hits.get(), 1);
    assert!(manager.is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_propagates_and_invalidates_chain() {
    let cleaned = Rc::new(Cell::new(false));
    let cleaned_clone = cleaned.clone();
    let mut task = Task::from_future(move |co| async move {
        co.on_cancel(move || cleaned_clone.set(true));
        co.wait(try_wait_until(|| Err(TaskError::msg("target lost")))).await;
        Ok(())
    });

    let err = task.resume().unwrap_err();
    assert!(matches!(err, TaskError::Routine(_)));
    assert!(!task.is_valid());
    assert!(cleaned.get());
}

#[test]
fn test_config_drives_manager_budget() {
    let config = tickflow::SchedulerConfig::from_json(r#"{ "step_budget": 8 }"#).unwrap();
    let mut manager = TaskManager::with_config(&config);
    manager.add(Task::from_future(|co| async move {
        loop {
            co.wait(wait_ticks(0)).await;
        }
    }));

    let err = manager.update().unwrap_err();
    assert!(matches!(err, TaskError::StepBudgetExceeded { limit: 8 }));
    assert!(manager.is_empty());
}
