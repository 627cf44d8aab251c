// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Move-with-contents planning.
//!
//! When a batch of widgets is repositioned without changing size, their
//! existing pixels can be copied to the new location within the window's
//! backing raster instead of being repainted. Copies must be ordered so that
//! no copy overwrites pixels that a later copy still has to read.
//!
//! [`plan_moves`] turns a batch of [`MoveCandidate`]s into a [`MovePlan`] in
//! three steps:
//!
//! 1. **Direction consensus.** Each candidate votes for the directions it
//!    moves in (a diagonal move votes twice). The direction with the most
//!    votes wins; ties go to north, then south, then west, then east.
//!    Candidates that do not move in the winning direction fall back to a
//!    redraw.
//! 2. **Greedy order.** Survivors are sorted so that the one whose
//!    destination lies furthest along the winning direction goes first.
//! 3. **Overlap repair.** Survivors not yet finalized are kept in four
//!    edge-ordered indexes over their *source* rectangles, which give the
//!    bounding box of everything still pending. A survivor is finalized once
//!    its destination misses that bounding box. Otherwise pending survivors
//!    are probed one by one: a probe whose source truly overlaps the
//!    destination is a blocker and is processed first; if the bounding box
//!    of the remaining survivors stops intersecting, the destination was
//!    clear all along. A blocker that is itself waiting on the current
//!    survivor closes a cycle, and the current survivor falls back to a
//!    redraw.
//!
//! At the moment a survivor is finalized, no survivor finalized after it has
//! a source rectangle overlapping its destination.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use kurbo::{Point, Rect};

use crate::geometry::{self, overlaps};

/// A widget whose location changed but whose size did not.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveCandidate<K> {
    /// Caller-defined identity, carried through unchanged.
    pub key: K,
    /// The widget's previous absolute rectangle in the backing raster.
    pub source: Rect,
    /// The widget's new absolute origin.
    pub dest: Point,
}

impl<K> MoveCandidate<K> {
    /// Creates a candidate.
    #[must_use]
    pub fn new(key: K, source: Rect, dest: Point) -> Self {
        Self { key, source, dest }
    }

    /// Returns the rectangle the widget will occupy after the move.
    #[must_use]
    pub fn dest_rect(&self) -> Rect {
        self.source.with_origin(self.dest)
    }

    fn displacement(&self) -> (f64, f64) {
        (self.dest.x - self.source.x0, self.dest.y - self.source.y0)
    }

    /// Returns `true` if the widget moves in `direction`.
    #[must_use]
    pub fn moves_toward(&self, direction: Direction) -> bool {
        let (dx, dy) = self.displacement();
        match direction {
            Direction::North => dy < 0.0,
            Direction::South => dy > 0.0,
            Direction::West => dx < 0.0,
            Direction::East => dx > 0.0,
        }
    }
}

/// A direction of travel, in tie-break priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Toward smaller `y`.
    North,
    /// Toward larger `y`.
    South,
    /// Toward smaller `x`.
    West,
    /// Toward larger `x`.
    East,
}

impl Direction {
    /// All directions, highest tie-break priority first.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::West, Self::East];

    /// Compares two destinations so that the one further along this
    /// direction sorts first.
    fn furthest_first(self, a: Rect, b: Rect) -> Ordering {
        match self {
            Self::North => a.y0.total_cmp(&b.y0),
            Self::South => b.y1.total_cmp(&a.y1),
            Self::West => a.x0.total_cmp(&b.x0),
            Self::East => b.x1.total_cmp(&a.x1),
        }
    }
}

/// Per-direction vote counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionVotes {
    /// Votes for [`Direction::North`].
    pub north: usize,
    /// Votes for [`Direction::South`].
    pub south: usize,
    /// Votes for [`Direction::West`].
    pub west: usize,
    /// Votes for [`Direction::East`].
    pub east: usize,
}

impl DirectionVotes {
    /// Tallies the votes of `candidates`.
    #[must_use]
    pub fn tally<K>(candidates: &[MoveCandidate<K>]) -> Self {
        let mut votes = Self::default();
        for c in candidates {
            for direction in Direction::ALL {
                if c.moves_toward(direction) {
                    *votes.get_mut(direction) += 1;
                }
            }
        }
        votes
    }

    /// Returns the vote count for `direction`.
    #[must_use]
    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::West => self.west,
            Direction::East => self.east,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut usize {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::West => &mut self.west,
            Direction::East => &mut self.east,
        }
    }

    /// Returns the winning direction, or `None` if nobody voted.
    ///
    /// Ties are broken by [`Direction::ALL`] order.
    #[must_use]
    pub fn winner(&self) -> Option<Direction> {
        let mut best: Option<(Direction, usize)> = None;
        for direction in Direction::ALL {
            let count = self.get(direction);
            if count > 0 && best.is_none_or(|(_, b)| count > b) {
                best = Some((direction, count));
            }
        }
        best.map(|(direction, _)| direction)
    }
}

/// The result of [`plan_moves`].
#[derive(Clone, Debug, PartialEq)]
pub struct MovePlan<K> {
    /// The winning direction, if any candidate moved at all.
    pub direction: Option<Direction>,
    /// Copies that are safe to execute in this order.
    pub moves: Vec<MoveCandidate<K>>,
    /// Candidates that must be redrawn instead.
    pub fallback: Vec<MoveCandidate<K>>,
}

impl<K> Default for MovePlan<K> {
    fn default() -> Self {
        Self {
            direction: None,
            moves: Vec::new(),
            fallback: Vec::new(),
        }
    }
}

/// Orders a batch of moves so each copy can run without clobbering pixels
/// another pending copy needs.
///
/// Candidates with a degenerate source rectangle go straight to the
/// fallback list.
#[must_use]
pub fn plan_moves<K: Copy>(candidates: Vec<MoveCandidate<K>>) -> MovePlan<K> {
    let mut plan = MovePlan::default();

    let (valid, degenerate): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| {
        !geometry::is_degenerate(c.source) && c.dest.x.is_finite() && c.dest.y.is_finite()
    });
    plan.fallback.extend(degenerate);

    let votes = DirectionVotes::tally(&valid);
    let Some(direction) = votes.winner() else {
        plan.fallback.extend(valid);
        return plan;
    };
    plan.direction = Some(direction);

    let (mut survivors, discarded): (Vec<_>, Vec<_>) =
        valid.into_iter().partition(|c| c.moves_toward(direction));
    plan.fallback.extend(discarded);

    survivors.sort_by(|a, b| direction.furthest_first(a.dest_rect(), b.dest_rect()));

    let mut repair = Repair::new(&survivors);
    for start in 0..survivors.len() {
        repair.settle(start);
    }
    for (idx, outcome) in repair.finalized {
        match outcome {
            Outcome::Move => plan.moves.push(survivors[idx]),
            Outcome::Fallback => plan.fallback.push(survivors[idx]),
        }
    }
    plan
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Move,
    Fallback,
}

/// Overlap-repair state over the greedily ordered survivors.
struct Repair {
    sources: Vec<Rect>,
    dests: Vec<Rect>,
    pending: EdgeIndex,
    done: Vec<bool>,
    waiting: Vec<bool>,
    stack: Vec<usize>,
    finalized: Vec<(usize, Outcome)>,
}

impl Repair {
    fn new<K>(survivors: &[MoveCandidate<K>]) -> Self {
        let sources: Vec<Rect> = survivors.iter().map(|c| c.source).collect();
        let mut pending = EdgeIndex::default();
        for (idx, source) in sources.iter().enumerate() {
            pending.insert(idx, *source);
        }
        Self {
            dests: survivors.iter().map(MoveCandidate::dest_rect).collect(),
            done: vec![false; sources.len()],
            waiting: vec![false; sources.len()],
            stack: Vec::new(),
            finalized: Vec::with_capacity(sources.len()),
            pending,
            sources,
        }
    }

    /// Finalizes `start`, first finalizing whatever blocks it.
    fn settle(&mut self, start: usize) {
        if self.done[start] {
            return;
        }
        let mut current = start;
        loop {
            self.pending.remove(current, self.sources[current]);
            let outcome = match self.find_blocker(self.dests[current]) {
                None => Outcome::Move,
                Some(blocker) if self.waiting[blocker] => Outcome::Fallback,
                Some(blocker) => {
                    // Keep our source pending: the blocker must not clobber it.
                    self.pending.insert(current, self.sources[current]);
                    self.waiting[current] = true;
                    self.stack.push(current);
                    current = blocker;
                    continue;
                }
            };
            self.done[current] = true;
            self.finalized.push((current, outcome));
            if self.stack.is_empty() {
                return;
            }
            current = self.pop_waiting();
        }
    }

    fn pop_waiting(&mut self) -> usize {
        let Some(idx) = self.stack.pop() else {
            panic!("internal error: move-order repair stack is empty");
        };
        self.waiting[idx] = false;
        idx
    }

    /// Returns a pending survivor whose source overlaps `dest`, if any.
    ///
    /// The pending indexes are left exactly as they were found.
    fn find_blocker(&mut self, dest: Rect) -> Option<usize> {
        let mut probed = Vec::new();
        let blocker = loop {
            let Some(bounds) = self.pending.bounds() else {
                break None;
            };
            if !overlaps(dest, bounds) {
                break None;
            }
            let Some(probe) = self.pending.probe_toward(dest) else {
                break None;
            };
            self.pending.remove(probe, self.sources[probe]);
            probed.push(probe);
            if overlaps(self.sources[probe], dest) {
                break Some(probe);
            }
        };
        for idx in probed {
            self.pending.insert(idx, self.sources[idx]);
        }
        blocker
    }
}

/// A totally ordered `f64` edge coordinate.
#[derive(Clone, Copy, Debug)]
struct Edge(f64);

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Pending source rectangles indexed by each of their four edges.
#[derive(Debug, Default)]
struct EdgeIndex {
    left: BTreeSet<(Edge, usize)>,
    right: BTreeSet<(Edge, usize)>,
    top: BTreeSet<(Edge, usize)>,
    bottom: BTreeSet<(Edge, usize)>,
}

impl EdgeIndex {
    fn insert(&mut self, idx: usize, r: Rect) {
        let fresh = self.left.insert((Edge(r.x0), idx));
        assert!(fresh, "internal error: survivor {idx} is already pending");
        self.right.insert((Edge(r.x1), idx));
        self.top.insert((Edge(r.y0), idx));
        self.bottom.insert((Edge(r.y1), idx));
    }

    fn remove(&mut self, idx: usize, r: Rect) {
        let present = self.left.remove(&(Edge(r.x0), idx));
        assert!(present, "internal error: survivor {idx} is not pending");
        self.right.remove(&(Edge(r.x1), idx));
        self.top.remove(&(Edge(r.y0), idx));
        self.bottom.remove(&(Edge(r.y1), idx));
    }

    /// Bounding box of every pending source.
    fn bounds(&self) -> Option<Rect> {
        let (Edge(x0), _) = self.left.first()?;
        let (Edge(x1), _) = self.right.last()?;
        let (Edge(y0), _) = self.top.first()?;
        let (Edge(y1), _) = self.bottom.last()?;
        Some(Rect::new(*x0, *y0, *x1, *y1))
    }

    /// Picks the pending source whose edge sticks out furthest past `dest`,
    /// so removing it shrinks the bounding box where it matters most.
    fn probe_toward(&self, dest: Rect) -> Option<usize> {
        let extremes = [
            self.left.first().map(|(Edge(x0), i)| (dest.x0 - x0, *i)),
            self.right.last().map(|(Edge(x1), i)| (x1 - dest.x1, *i)),
            self.top.first().map(|(Edge(y0), i)| (dest.y0 - y0, *i)),
            self.bottom.last().map(|(Edge(y1), i)| (y1 - dest.y1, *i)),
        ];
        extremes
            .into_iter()
            .flatten()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, idx)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect;

    fn candidate(key: u32, source: Rect, x: f64, y: f64) -> MoveCandidate<u32> {
        MoveCandidate::new(key, source, Point::new(x, y))
    }

    fn keys(moves: &[MoveCandidate<u32>]) -> Vec<u32> {
        moves.iter().map(|m| m.key).collect()
    }

    #[test]
    fn uniform_east_shift_runs_furthest_first() {
        let plan = plan_moves(vec![
            candidate(1, rect(0.0, 0.0, 10.0, 10.0), 10.0, 0.0),
            candidate(2, rect(20.0, 0.0, 10.0, 10.0), 30.0, 0.0),
            candidate(3, rect(40.0, 0.0, 10.0, 10.0), 50.0, 0.0),
        ]);
        assert_eq!(plan.direction, Some(Direction::East));
        assert_eq!(keys(&plan.moves), [3, 2, 1]);
        assert!(plan.fallback.is_empty(), "every move is copyable");
    }

    #[test]
    fn diagonal_mover_keeps_its_place_when_clear() {
        // A: (0,0,10,10) -> (20,0). B: (15,15,10,10) -> (40,13).
        let plan = plan_moves(vec![
            candidate(0xA, rect(0.0, 0.0, 10.0, 10.0), 20.0, 0.0),
            candidate(0xB, rect(15.0, 15.0, 10.0, 10.0), 40.0, 13.0),
        ]);
        assert_eq!(plan.direction, Some(Direction::East));
        assert_eq!(keys(&plan.moves), [0xB, 0xA]);
        assert!(plan.fallback.is_empty());
    }

    #[test]
    fn genuine_blocker_is_finalized_first() {
        // A sorts first (its destination reaches x = 25) but lands on B's
        // source, so B must be copied out of the way beforehand.
        let a = candidate(0xA, rect(0.0, 0.0, 10.0, 10.0), 15.0, 0.0);
        let b = candidate(0xB, rect(12.0, 5.0, 10.0, 10.0), 13.0, 40.0);
        let c = candidate(0xC, rect(100.0, 0.0, 10.0, 10.0), 101.0, 0.0);
        let plan = plan_moves(vec![a, b, c]);
        assert_eq!(plan.direction, Some(Direction::East));
        assert_eq!(keys(&plan.moves), [0xC, 0xB, 0xA]);
    }

    #[test]
    fn zero_width_source_never_blocks() {
        // The sliver sits inside A's destination but has no pixels to lose.
        let a = candidate(0xA, rect(0.0, 0.0, 10.0, 10.0), 10.0, 0.0);
        let sliver = candidate(1, Rect::new(15.0, 0.0, 15.0, 10.0), 17.0, 0.0);
        let plan = plan_moves(vec![sliver, a]);
        assert_eq!(keys(&plan.moves), [0xA, 1]);
        assert!(plan.fallback.is_empty());
    }

    #[test]
    fn bounding_box_false_positive_is_cleared_by_probing() {
        // The pending sources straddle A's destination without touching it.
        let a = candidate(0xA, rect(40.0, 40.0, 10.0, 10.0), 50.0, 40.0);
        let left = candidate(1, rect(0.0, 0.0, 10.0, 10.0), 1.0, 0.0);
        let right = candidate(2, rect(100.0, 100.0, 10.0, 10.0), 101.0, 100.0);
        let plan = plan_moves(vec![a, left, right]);
        assert_eq!(keys(&plan.moves), [2, 0xA, 1]);
    }

    #[test]
    fn mutual_overlap_falls_back_to_redraw() {
        // A moves onto B's source and B moves onto A's source.
        let a = candidate(0xA, rect(0.0, 0.0, 10.0, 10.0), 5.0, 20.0);
        let b = candidate(0xB, rect(5.0, 20.0, 10.0, 10.0), 6.0, 0.0);
        let plan = plan_moves(vec![a, b]);
        assert_eq!(plan.direction, Some(Direction::East));
        assert_eq!(plan.moves.len(), 1, "one side of the cycle can still be copied");
        assert_eq!(plan.fallback.len(), 1);
    }

    #[test]
    fn losing_direction_falls_back() {
        let plan = plan_moves(vec![
            candidate(1, rect(0.0, 50.0, 10.0, 10.0), 0.0, 40.0),
            candidate(2, rect(20.0, 50.0, 10.0, 10.0), 20.0, 40.0),
            candidate(3, rect(40.0, 50.0, 10.0, 10.0), 45.0, 50.0),
        ]);
        assert_eq!(plan.direction, Some(Direction::North));
        assert_eq!(keys(&plan.moves), [1, 2]);
        assert_eq!(keys(&plan.fallback), [3]);
    }

    #[test]
    fn ties_prefer_north_then_south_then_west() {
        let votes = DirectionVotes {
            north: 2,
            south: 2,
            west: 2,
            east: 2,
        };
        assert_eq!(votes.winner(), Some(Direction::North));
        let votes = DirectionVotes {
            north: 0,
            south: 1,
            west: 1,
            east: 1,
        };
        assert_eq!(votes.winner(), Some(Direction::South));
        let votes = DirectionVotes {
            west: 3,
            east: 3,
            ..DirectionVotes::default()
        };
        assert_eq!(votes.winner(), Some(Direction::West));
        assert_eq!(DirectionVotes::default().winner(), None);
    }

    #[test]
    fn degenerate_and_stationary_candidates_fall_back() {
        let plan = plan_moves(vec![
            candidate(1, Rect::new(0.0, 0.0, f64::NAN, 10.0), 5.0, 0.0),
            candidate(2, rect(0.0, 0.0, 10.0, 10.0), 0.0, 0.0),
        ]);
        assert_eq!(plan.direction, None);
        assert!(plan.moves.is_empty());
        assert_eq!(plan.fallback.len(), 2);
    }

    #[test]
    fn zero_size_destination_is_trivially_safe() {
        let plan = plan_moves(vec![
            candidate(1, rect(0.0, 0.0, 0.0, 10.0), 20.0, 0.0),
            candidate(2, rect(20.0, 0.0, 10.0, 10.0), 21.0, 0.0),
        ]);
        assert_eq!(plan.moves.len(), 2);
    }
}
