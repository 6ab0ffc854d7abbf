//! The event dispatcher: the two per-ball heaps (`W`, `P[i]`) and the
//! two global heaps (`GW`, `GP`) that drive [`crate::simulation::Simulation::advance`].
//!
//! Wall events are always eagerly resynced: a ball's wall heap is
//! owned exclusively by that ball, so `GW` can never go stale without
//! the owning ball's own mutation also refreshing it. Pair events are
//! lazily invalidated instead: an entry in `P[i]` records the
//! generation of both balls involved at prediction time, and is
//! discarded unread if either generation has since advanced.

use std::cmp::Reverse;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use super::geometry::{pair_contact, PairContact};
use super::response::apply_pair_response;
use crate::simulation::Simulation;

/// A single cached prediction for a pair collision, owned by one of
/// the two balls' `pair_heaps` slot.
#[derive(Clone, Debug)]
pub(crate) struct PairHeapEntry {
    pub time: f64,
    pub partner: usize,
    gen_self: u64,
    gen_partner: u64,
    pub contact: PairContact,
}

impl PartialEq for PairHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.partner == other.partner
    }
}
impl Eq for PairHeapEntry {}

impl PartialOrd for PairHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PairHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.time)
            .cmp(&OrderedFloat(other.time))
            .then(self.partner.cmp(&other.partner))
    }
}

pub(crate) type PairHeap = BinaryHeap<Reverse<PairHeapEntry>>;
pub(crate) type GlobalWallQueue = PriorityQueue<usize, Reverse<(OrderedFloat<f64>, usize)>>;
pub(crate) type GlobalPairQueue = PriorityQueue<usize, Reverse<(OrderedFloat<f64>, usize, usize)>>;

impl Simulation {
    /// Re-derive `owner`'s wall-heap-top entry into `GW`.
    pub(crate) fn sync_gw(&mut self, owner: usize) {
        match self.balls[owner].next_wall_time() {
            Some(t) => {
                self.gw.push(owner, Reverse((OrderedFloat(t), owner)));
            }
            None => {
                self.gw.remove(&owner);
            }
        }
    }

    /// Drop stale entries off the top of `P[owner]`, then push the
    /// first still-valid one (if any) into `GP`.
    pub(crate) fn sync_gp(&mut self, owner: usize) {
        loop {
            let Some(Reverse(top)) = self.pair_heaps[owner].peek() else {
                self.gp.remove(&owner);
                return;
            };
            let gen_self_now = self.balls[owner].generation();
            let gen_partner_now = self.balls[top.partner].generation();
            if top.gen_self != gen_self_now || top.gen_partner != gen_partner_now {
                self.pair_heaps[owner].pop();
                continue;
            }
            self.gp.push(
                owner,
                Reverse((OrderedFloat(top.time), owner, top.partner)),
            );
            return;
        }
    }

    /// Fully recompute `owner`'s pair-collision predictions against
    /// every larger-indexed ball, replacing `P[owner]` from scratch.
    /// `P[owner]` only ever holds entries with `partner > owner` — the
    /// smaller-index ownership rule (§3) — so this alone does not
    /// account for pairs where `owner` is the *larger* index; see
    /// [`Simulation::refresh_pair_predictions`] for the other half.
    pub(crate) fn rebuild_pair_heap(&mut self, owner: usize) {
        let mut heap = BinaryHeap::new();
        let ball = &self.balls[owner];
        let (p_i, v_i) = (ball.position().clone(), ball.velocity().clone());
        let gen_self = ball.generation();
        let radius_i = ball.radius();
        let t0 = ball.t0();

        for partner in (owner + 1)..self.balls.len() {
            let other = &self.balls[partner];
            let (p_j, v_j) = other.position_and_velocity_at(t0, &self.gravity);
            let radius_sum = radius_i + other.radius();
            if let Some(contact) = pair_contact(&p_i, &v_i, &p_j, &v_j, radius_sum) {
                heap.push(Reverse(PairHeapEntry {
                    time: t0 + contact.dt,
                    partner,
                    gen_self,
                    gen_partner: other.generation(),
                    contact,
                }));
            }
        }
        self.pair_heaps[owner] = heap;
        self.sync_gp(owner);
    }

    /// Push a single fresh prediction for the pair `(owner, partner)`
    /// into `P[owner]`, where `owner < partner` owns that pair. Does
    /// not touch the rest of `P[owner]` — existing entries that are now
    /// stale are left for [`Simulation::sync_gp`] to discard lazily
    /// when reached.
    fn push_pair_prediction(&mut self, owner: usize, partner: usize) {
        debug_assert!(owner < partner);
        let t0 = self.balls[owner].t0();
        let (p_i, v_i) = (self.balls[owner].position().clone(), self.balls[owner].velocity().clone());
        let radius_i = self.balls[owner].radius();
        let gen_self = self.balls[owner].generation();
        let (p_j, v_j) = self.balls[partner].position_and_velocity_at(t0, &self.gravity);
        let radius_sum = radius_i + self.balls[partner].radius();
        let gen_partner = self.balls[partner].generation();
        if let Some(contact) = pair_contact(&p_i, &v_i, &p_j, &v_j, radius_sum) {
            let entry = PairHeapEntry {
                time: t0 + contact.dt,
                partner,
                gen_self,
                gen_partner,
                contact,
            };
            self.pair_heaps[owner].push(Reverse(entry));
        }
    }

    /// Called whenever `changed`'s trajectory has just been mutated by
    /// an event. Rebuilds `P[changed]` against every larger-indexed
    /// ball, and re-derives a fresh entry in `P[k]` for every
    /// smaller-indexed `k` whose pair with `changed` it owns, since
    /// those entries are owned by `k`'s heap, not `changed`'s, and
    /// nothing else will regenerate them.
    pub(crate) fn refresh_pair_predictions(&mut self, changed: usize) {
        self.rebuild_pair_heap(changed);
        for k in 0..changed {
            self.push_pair_prediction(k, changed);
            self.sync_gp(k);
        }
    }

    /// Seed both global heaps and every per-ball heap from a freshly
    /// constructed ball set. Pair predictions are seeded only for
    /// `partner > owner`, the same ownership rule maintained afterward
    /// by [`Simulation::refresh_pair_predictions`].
    pub(crate) fn initialize_heaps(&mut self) {
        let n = self.balls.len();
        self.pair_heaps = (0..n).map(|_| BinaryHeap::new()).collect();
        self.gw = PriorityQueue::new();
        self.gp = PriorityQueue::new();

        for i in 0..n {
            self.sync_gw(i);
        }
        for i in 0..n {
            self.rebuild_pair_heap(i);
        }
    }

    /// Run the event loop until no further event occurs at or before
    /// `horizon`. Returns the number of events processed.
    pub(crate) fn run_dispatcher(&mut self, horizon: f64) -> usize {
        let mut processed = 0usize;
        loop {
            let wall_candidate = self.gw.peek().map(|(&owner, Reverse((t, _)))| (t.into_inner(), owner));
            let pair_candidate = self
                .gp
                .peek()
                .map(|(&owner, Reverse((t, i, j)))| (t.into_inner(), owner, *i, *j));

            let next_is_wall = match (&wall_candidate, &pair_candidate) {
                (Some((tw, _)), Some((tp, _, _, _))) => tw <= tp,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            let event_time = if next_is_wall {
                wall_candidate.unwrap().0
            } else {
                pair_candidate.unwrap().0
            };
            if event_time > horizon {
                break;
            }

            if next_is_wall {
                let (_, owner) = wall_candidate.unwrap();
                let axis = self.balls[owner].apply_next_wall_event(&self.gravity);
                trace!("ball {owner} hit wall on axis {axis:?} at t={event_time}");
                self.sync_gw(owner);
                self.refresh_pair_predictions(owner);
            } else {
                let (_, owner, i, j) = pair_candidate.unwrap();
                debug_assert_eq!(owner, i);
                debug_assert!(i < j, "pair heap entries are only ever owned by the smaller index");
                let entry = {
                    let Reverse(top) = self.pair_heaps[i].peek().expect("GP entry without a live P top");
                    debug_assert_eq!(top.partner, j);
                    top.contact.clone()
                };
                self.pair_heaps[i].pop();
                debug!("ball {i} and ball {j} collide at t={event_time}");

                self.balls[i].rebase(event_time, &self.gravity);
                self.balls[j].rebase(event_time, &self.gravity);

                let (left, right) = self.balls.split_at_mut(j);
                apply_pair_response(&mut left[i], &mut right[0], &entry);

                self.balls[i].initialize_wall_heap(&self.gravity);
                self.balls[j].initialize_wall_heap(&self.gravity);
                self.sync_gw(i);
                self.sync_gw(j);
                self.refresh_pair_predictions(i);
                self.refresh_pair_predictions(j);
            }
            processed += 1;
        }
        processed
    }
}
