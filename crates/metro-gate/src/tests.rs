//! Unit tests for metro-gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use metro_core::{AgentId, Blocker, CancelToken, Cell};

use crate::{Coordinator, GateListener, NoListener, StallReport};

const A: AgentId = AgentId(0);
const B: AgentId = AgentId(1);
const C: AgentId = AgentId(2);

fn e(n: i32) -> Cell {
    Cell::new(0, n)
}

/// Poll `cond` until it holds or two seconds pass.
fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[derive(Default)]
struct Counting {
    blocked: AtomicUsize,
    stalls:  AtomicUsize,
}

impl GateListener for Counting {
    fn on_entrance_blocked(&self, _agent: AgentId, _entrance: Cell, _occupant: Option<AgentId>) {
        self.blocked.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stall(&self, _report: &StallReport) {
        self.stalls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Always(bool);

impl Blocker for Always {
    fn is_blocking(&self, _waiter: AgentId) -> bool {
        self.0
    }
}

// ── AdmissionQueue ────────────────────────────────────────────────────────────

#[cfg(test)]
mod admission {
    use super::*;
    use crate::AdmissionQueue;

    #[test]
    fn no_duplicates() {
        let mut q = AdmissionQueue::from_order([A, B, A, C]);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![A, B, C]);
        assert!(!q.push_back(B));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn remove_and_requeue_rotates() {
        let mut q = AdmissionQueue::from_order([A, B, C]);
        assert!(q.remove(A));
        assert!(!q.remove(A));
        assert!(q.push_back(A));
        assert_eq!(q.first_eligible(|_| true), Some(B));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![B, C, A]);
    }

    #[test]
    fn first_eligible_skips() {
        let q = AdmissionQueue::from_order([A, B, C]);
        assert_eq!(q.first_eligible(|a| a != A), Some(B));
        assert_eq!(q.first_eligible(|_| false), None);
        assert!(AdmissionQueue::new().is_empty());
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod construction {
    use super::*;
    use crate::GateError;

    #[test]
    fn unknown_start_entrance() {
        let err = Coordinator::new(&[e(0)], [A], &[(A, e(5))]).err().unwrap();
        assert!(matches!(err, GateError::UnknownEntrance(cell) if cell == e(5)));
    }

    #[test]
    fn two_trains_on_one_entrance() {
        let err = Coordinator::new(&[e(0), e(1)], [A, B], &[(A, e(0)), (B, e(0))]).err().unwrap();
        assert!(matches!(err, GateError::DuplicateOccupant { first: A, second: B, .. }));
    }

    #[test]
    fn start_entrances_are_pre_marked() {
        let gate = Coordinator::new(&[e(0), e(1), e(0)], [A, B], &[(A, e(0))]).unwrap();
        assert_eq!(gate.occupant(e(0)), Some(A));
        assert_eq!(gate.occupant(e(1)), None);
        assert_eq!(gate.occupant(e(9)), None);
        assert_eq!(gate.queue_snapshot(), vec![A, B]);

        // The repeated cell is one slot: freeing it once frees it.
        assert!(gate.release(A, e(0)).unwrap());
        assert!(!gate.reserve(B, e(0), &CancelToken::new(B)).unwrap());
        assert_eq!(gate.occupant(e(0)), Some(B));
    }
}

// ── Station gate ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod station {
    use super::*;

    #[test]
    fn self_reservation_never_blocks() {
        let gate = Coordinator::new(&[e(0)], [A], &[(A, e(0))]).unwrap();
        assert!(!gate.reserve(A, e(0), &CancelToken::new(A)).unwrap());
    }

    #[test]
    fn release_by_other_train_is_ignored() {
        let gate = Coordinator::new(&[e(0)], [A, B], &[(A, e(0))]).unwrap();
        assert!(!gate.release(B, e(0)).unwrap());
        assert_eq!(gate.occupant(e(0)), Some(A));
        assert!(gate.release(A, e(0)).unwrap());
        assert_eq!(gate.occupant(e(0)), None);
    }

    #[test]
    fn reserve_blocks_until_that_entrance_is_released() {
        let gate = Arc::new(Coordinator::new(&[e(0), e(1)], [A, B], &[(A, e(0)), (B, e(1))]).unwrap());
        let got = Arc::new(AtomicBool::new(false));

        let handle = {
            let gate = Arc::clone(&gate);
            let got = Arc::clone(&got);
            thread::spawn(move || {
                let waited = gate.reserve(B, e(0), &CancelToken::new(B)).unwrap();
                got.store(true, Ordering::SeqCst);
                waited
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!got.load(Ordering::SeqCst));

        // Releasing a different entrance must not let B in.
        gate.release(B, e(1)).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!got.load(Ordering::SeqCst));
        assert_eq!(gate.occupant(e(0)), Some(A));

        gate.release(A, e(0)).unwrap();
        assert!(handle.join().unwrap());
        assert_eq!(gate.occupant(e(0)), Some(B));
    }

    #[test]
    fn cancelled_reserve_returns() {
        let gate = Arc::new(Coordinator::new(&[e(0)], [A, B], &[(A, e(0))]).unwrap());
        let token = CancelToken::new(B);
        let handle = {
            let gate = Arc::clone(&gate);
            let token = token.clone();
            thread::spawn(move || gate.reserve(B, e(0), &token))
        };
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        gate.wake_all();
        assert!(handle.join().unwrap().is_err());
        assert_eq!(gate.occupant(e(0)), Some(A));
    }
}

// ── Courses and fairness ──────────────────────────────────────────────────────

#[cfg(test)]
mod courses {
    use super::*;
    use crate::GateError;

    fn three_trains() -> Coordinator {
        // Each train shuttles between its own pair of entrances.
        Coordinator::new(
            &[e(0), e(1), e(2), e(3), e(4), e(5)],
            [A, B, C],
            &[(A, e(0)), (B, e(2)), (C, e(4))],
        )
        .unwrap()
    }

    #[test]
    fn grant_claims_destination_and_end_requeues() {
        let gate = three_trains();
        let grant = gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap();
        assert_eq!(grant.turn, 1);
        assert!(!grant.waited);
        assert_eq!(gate.occupant(e(1)), Some(A));
        assert_eq!(gate.occupant(e(0)), Some(A));
        assert_eq!(gate.queue_snapshot(), vec![B, C]);

        gate.end_course(A, e(0)).unwrap();
        assert_eq!(gate.occupant(e(0)), None);
        assert_eq!(gate.queue_snapshot(), vec![B, C, A]);
    }

    #[test]
    fn station_gate_and_courses_share_slots() {
        let gate = Arc::new(three_trains());
        // C holds A's destination through the station gate.
        assert!(!gate.reserve(C, e(1), &CancelToken::new(C)).unwrap());

        let handle = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener))
        };
        assert!(eventually(|| gate.parked_on(A) == Some(e(1))));

        assert!(gate.release(C, e(1)).unwrap());
        let grant = handle.join().unwrap().unwrap();
        assert!(grant.waited);
        assert_eq!(gate.occupant(e(1)), Some(A));

        // The origin freed by the course end is open to the station gate.
        gate.end_course(A, e(0)).unwrap();
        assert!(!gate.reserve(B, e(0), &CancelToken::new(B)).unwrap());
        assert_eq!(gate.occupant(e(0)), Some(B));
    }

    #[test]
    fn misuse_is_reported() {
        let gate = three_trains();
        assert!(matches!(gate.end_course(A, e(0)), Err(GateError::NotInCourse(A))));
        gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap();
        let err = gate.begin_course(A, e(0), &CancelToken::new(A), &NoListener).unwrap_err();
        assert!(matches!(err, GateError::NotQueued(A)));
        let err = gate.begin_course(B, e(9), &CancelToken::new(B), &NoListener).unwrap_err();
        assert!(matches!(err, GateError::UnknownEntrance(_)));
    }

    #[test]
    fn turns_follow_queue_order() {
        let gate = Arc::new(three_trains());
        let c_turn = Arc::new(AtomicUsize::new(0));

        let handle = {
            let gate = Arc::clone(&gate);
            let c_turn = Arc::clone(&c_turn);
            thread::spawn(move || {
                let grant = gate.begin_course(C, e(5), &CancelToken::new(C), &NoListener).unwrap();
                c_turn.store(grant.turn as usize, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(40));
        assert_eq!(c_turn.load(Ordering::SeqCst), 0, "C ran ahead of A and B");

        assert_eq!(gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap().turn, 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(c_turn.load(Ordering::SeqCst), 0, "C ran ahead of B");

        assert_eq!(gate.begin_course(B, e(3), &CancelToken::new(B), &NoListener).unwrap().turn, 2);
        handle.join().unwrap();
        assert_eq!(c_turn.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn one_course_per_rotation_without_contention() {
        let gate = three_trains();
        let legs = [(A, e(0), e(1)), (B, e(2), e(3)), (C, e(4), e(5))];
        let mut order = Vec::new();
        for round in 0..4 {
            for &(agent, x, y) in &legs {
                let (from, to) = if round % 2 == 0 { (x, y) } else { (y, x) };
                let grant = gate.begin_course(agent, to, &CancelToken::new(agent), &NoListener).unwrap();
                order.push((grant.turn, agent));
                gate.end_course(agent, from).unwrap();
            }
        }
        for (i, chunk) in order.chunks(3).enumerate() {
            let agents: Vec<AgentId> = chunk.iter().map(|&(_, a)| a).collect();
            assert_eq!(agents, vec![A, B, C], "rotation {i}");
        }
        assert_eq!(gate.grants(), 12);
    }

    #[test]
    fn concurrent_trains_all_progress() {
        let gate = Arc::new(three_trains());
        let legs = [(A, e(0), e(1)), (B, e(2), e(3)), (C, e(4), e(5))];
        let handles: Vec<_> = legs
            .into_iter()
            .map(|(agent, x, y)| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    let token = CancelToken::new(agent);
                    let (mut from, mut to) = (x, y);
                    for _ in 0..10 {
                        gate.begin_course(agent, to, &token, &NoListener).unwrap();
                        thread::sleep(Duration::from_millis(1));
                        gate.end_course(agent, from).unwrap();
                        std::mem::swap(&mut from, &mut to);
                    }
                    gate.retire(agent, &NoListener);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gate.grants(), 30);
        assert!(gate.current_stall().is_none());
    }

    #[test]
    fn paused_train_keeps_its_place_but_is_skipped() {
        let gate = three_trains();
        gate.withdraw(A);
        let grant = gate.begin_course(B, e(3), &CancelToken::new(B), &NoListener).unwrap();
        assert_eq!(grant.turn, 1);
        assert_eq!(gate.queue_snapshot(), vec![A, C]);
        gate.rejoin(A);
        gate.rejoin(A);
        assert_eq!(gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap().turn, 2);
    }

    #[test]
    fn parked_train_passes_its_turn_and_claims_when_freed() {
        // B wants A's start entrance.
        let gate = Arc::new(
            Coordinator::new(&[e(0), e(1), e(2), e(3)], [B, C, A], &[(A, e(0)), (B, e(2)), (C, e(3))]).unwrap(),
        );
        let listener = Arc::new(Counting::default());

        let b = {
            let gate = Arc::clone(&gate);
            let listener = Arc::clone(&listener);
            thread::spawn(move || gate.begin_course(B, e(0), &CancelToken::new(B), &*listener).unwrap())
        };

        assert!(eventually(|| gate.parked_on(B) == Some(e(0))));
        assert_eq!(gate.queue_snapshot(), vec![C, A]);

        // C and A proceed while B is parked.
        assert_eq!(gate.begin_course(C, e(1), &CancelToken::new(C), &NoListener).unwrap().turn, 1);
        gate.end_course(C, e(3)).unwrap();
        assert_eq!(gate.begin_course(A, e(3), &CancelToken::new(A), &NoListener).unwrap().turn, 2);
        gate.end_course(A, e(0)).unwrap();

        let grant = b.join().unwrap();
        assert!(grant.waited);
        assert_eq!(grant.turn, 3);
        assert_eq!(gate.occupant(e(0)), Some(B));
        assert!(gate.parked_on(B).is_none());
        assert_eq!(listener.blocked.load(Ordering::SeqCst), 1);
        assert_eq!(listener.stalls.load(Ordering::SeqCst), 0);
    }
}

// ── Stall detection ───────────────────────────────────────────────────────────

#[cfg(test)]
mod stall {
    use super::*;
    use crate::GateError;

    #[test]
    fn cyclic_destinations_stall_and_stay_cancellable() {
        // A sits on e0 and wants e1, B sits on e1 and wants e2, C sits on e2
        // and wants e0.
        let gate = Arc::new(
            Coordinator::new(&[e(0), e(1), e(2)], [A, B, C], &[(A, e(0)), (B, e(1)), (C, e(2))]).unwrap(),
        );
        let listener = Arc::new(Counting::default());
        let tokens: Vec<CancelToken> = [A, B, C].iter().map(|&a| CancelToken::new(a)).collect();

        let handles: Vec<_> = [(A, e(1)), (B, e(2)), (C, e(0))]
            .into_iter()
            .zip(tokens.iter().cloned())
            .map(|((agent, dest), token)| {
                let gate = Arc::clone(&gate);
                let listener = Arc::clone(&listener);
                thread::spawn(move || gate.begin_course(agent, dest, &token, &*listener))
            })
            .collect();

        assert!(eventually(|| gate.current_stall().is_some()));
        let report = gate.current_stall().unwrap();
        assert_eq!(report.parked, vec![(A, e(1)), (B, e(2)), (C, e(0))]);
        assert!(report.track_blocked.is_empty());
        assert!(eventually(|| listener.stalls.load(Ordering::SeqCst) == 1));
        assert!(report.to_string().contains("train-A waits for entrance (0,1)"));

        for token in &tokens {
            token.cancel();
        }
        gate.wake_all();
        for h in handles {
            assert!(matches!(h.join().unwrap(), Err(GateError::Cancelled(_))));
        }
    }

    #[test]
    fn blocked_on_track_plus_parked_is_a_stall() {
        let gate = Arc::new(Coordinator::new(&[e(0), e(1), e(2)], [A, B], &[(A, e(0)), (B, e(2))]).unwrap());
        gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap();

        let token_b = CancelToken::new(B);
        let b = {
            let gate = Arc::clone(&gate);
            let token = token_b.clone();
            thread::spawn(move || gate.begin_course(B, e(1), &token, &NoListener))
        };
        assert!(eventually(|| gate.parked_on(B).is_some()));
        assert!(gate.current_stall().is_none(), "A is still moving");

        gate.note_track_wait(A, Some(Arc::new(Always(true)) as Arc<dyn Blocker>), &NoListener);
        let report = gate.current_stall().unwrap();
        assert_eq!(report.parked, vec![(B, e(1))]);
        assert_eq!(report.track_blocked, vec![A]);

        gate.note_track_wait(A, None, &NoListener);
        assert!(gate.current_stall().is_none());

        token_b.cancel();
        gate.wake_all();
        assert!(b.join().unwrap().is_err());
    }

    #[test]
    fn stale_track_blocker_is_not_a_stall() {
        let gate = Arc::new(Coordinator::new(&[e(0), e(1), e(2)], [A, B], &[(A, e(0)), (B, e(2))]).unwrap());
        gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap();
        let token_b = CancelToken::new(B);
        let b = {
            let gate = Arc::clone(&gate);
            let token = token_b.clone();
            thread::spawn(move || gate.begin_course(B, e(1), &token, &NoListener))
        };
        assert!(eventually(|| gate.parked_on(B).is_some()));

        // The lock was released between the failed try and the report.
        gate.note_track_wait(A, Some(Arc::new(Always(false)) as Arc<dyn Blocker>), &NoListener);
        assert!(gate.current_stall().is_none());

        token_b.cancel();
        gate.wake_all();
        assert!(b.join().unwrap().is_err());
    }

    #[test]
    fn paused_train_prevents_a_stall_report() {
        let gate = Arc::new(Coordinator::new(&[e(0), e(1)], [A, B], &[(A, e(0)), (B, e(1))]).unwrap());
        gate.withdraw(A);
        let token_b = CancelToken::new(B);
        let b = {
            let gate = Arc::clone(&gate);
            let token = token_b.clone();
            thread::spawn(move || gate.begin_course(B, e(0), &token, &NoListener))
        };
        assert!(eventually(|| gate.parked_on(B).is_some()));
        assert!(gate.current_stall().is_none());

        token_b.cancel();
        gate.wake_all();
        assert!(b.join().unwrap().is_err());
    }

    #[test]
    fn retire_frees_entrances_and_queue_place() {
        let gate = Arc::new(Coordinator::new(&[e(0), e(1)], [A, B], &[(A, e(0)), (B, e(1))]).unwrap());
        let b = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.begin_course(B, e(0), &CancelToken::new(B), &NoListener))
        };
        // B is behind A in the queue; retiring A both frees e0 and passes the turn.
        thread::sleep(Duration::from_millis(30));
        gate.retire(A, &NoListener);
        let grant = b.join().unwrap().unwrap();
        assert_eq!(grant.turn, 1);
        assert_eq!(gate.occupant(e(0)), Some(B));
        assert!(!gate.queue_snapshot().contains(&A));
        let err = gate.begin_course(A, e(1), &CancelToken::new(A), &NoListener).unwrap_err();
        assert!(matches!(err, GateError::Retired(A)));
    }
}
