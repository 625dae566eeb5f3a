//! D'Hondt (highest averages) seat allocation for proportional blocks.
//!
//! Pure integers; no division in comparisons (cross-multiply in u128).
//! Scans run in party-id order, so quotient ties resolve to the
//! lexicographically smallest party id.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use sim_core::ids::PartyId;

use crate::AlgoError;

/// Allocate `seats` sequentially by picking the max of v/(s+1).
///
/// Parties with zero votes stay in the result map with zero seats. Returns
/// an empty map when `seats == 0`; errors when no party has any votes while
/// seats remain to be awarded.
pub fn allocate_dhondt(
    seats: u32,
    votes: &BTreeMap<PartyId, u64>,
) -> Result<BTreeMap<PartyId, u32>, AlgoError> {
    if seats == 0 {
        return Ok(BTreeMap::new());
    }
    let order: Vec<&PartyId> = votes
        .iter()
        .filter(|(_, &v)| v > 0)
        .map(|(p, _)| p)
        .collect();
    if order.is_empty() {
        return Err(AlgoError::NoEligibleParties);
    }

    let mut alloc: BTreeMap<PartyId, u32> =
        votes.keys().cloned().map(|p| (p, 0)).collect();

    for _round in 0..seats {
        let winner = next_award(&alloc, votes, &order);
        *alloc.get_mut(winner).expect("winner came from alloc keys") += 1;
    }
    Ok(alloc)
}

/// Argmax of v/(s+1) over `order`; first in id order wins exact ties.
fn next_award<'a>(
    seats_so_far: &BTreeMap<PartyId, u32>,
    votes: &BTreeMap<PartyId, u64>,
    order: &[&'a PartyId],
) -> &'a PartyId {
    let mut best = order[0];
    let mut best_v = votes[best];
    let mut best_s = seats_so_far[best];

    for &id in &order[1..] {
        let v = votes[id];
        let s = seats_so_far[id];
        if cmp_quotients(v, s, best_v, best_s) == Ordering::Greater {
            best = id;
            best_v = v;
            best_s = s;
        }
    }
    best
}

/// Compare v_a/(s_a+1) against v_b/(s_b+1) without floats.
fn cmp_quotients(v_a: u64, s_a: u32, v_b: u64, s_b: u32) -> Ordering {
    let lhs = (v_a as u128) * ((s_b as u128) + 1);
    let rhs = (v_b as u128) * ((s_a as u128) + 1);
    lhs.cmp(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(&str, u64)]) -> BTreeMap<PartyId, u64> {
        pairs
            .iter()
            .map(|(p, v)| (p.parse().unwrap(), *v))
            .collect()
    }

    #[test]
    fn textbook_five_seats() {
        // Quotient sequence: A 100, B 80, A 50, B 40, A 33.3 -> A:3 B:2 C:0
        let alloc = allocate_dhondt(5, &votes(&[("A", 100), ("B", 80), ("C", 20)])).unwrap();
        assert_eq!(alloc[&"A".parse::<PartyId>().unwrap()], 3);
        assert_eq!(alloc[&"B".parse::<PartyId>().unwrap()], 2);
        assert_eq!(alloc[&"C".parse::<PartyId>().unwrap()], 0);
    }

    #[test]
    fn seats_conserved() {
        let alloc =
            allocate_dhondt(17, &votes(&[("A", 123), ("B", 77), ("C", 55), ("D", 3)])).unwrap();
        let total: u32 = alloc.values().sum();
        assert_eq!(total, 17);
    }

    #[test]
    fn tie_goes_to_lexicographically_first() {
        // Equal votes: every quotient ties, so the first id takes each round.
        let alloc = allocate_dhondt(1, &votes(&[("beta", 50), ("alpha", 50)])).unwrap();
        assert_eq!(alloc[&"alpha".parse::<PartyId>().unwrap()], 1);
        assert_eq!(alloc[&"beta".parse::<PartyId>().unwrap()], 0);
    }

    #[test]
    fn zero_seats_empty_map() {
        let alloc = allocate_dhondt(0, &votes(&[("A", 10)])).unwrap();
        assert!(alloc.is_empty());
    }

    #[test]
    fn all_zero_votes_is_error() {
        assert!(allocate_dhondt(3, &votes(&[("A", 0), ("B", 0)])).is_err());
    }

    #[test]
    fn zero_vote_party_keeps_entry() {
        let alloc = allocate_dhondt(2, &votes(&[("A", 10), ("B", 0)])).unwrap();
        assert_eq!(alloc[&"B".parse::<PartyId>().unwrap()], 0);
        assert_eq!(alloc[&"A".parse::<PartyId>().unwrap()], 2);
    }

    #[test]
    fn large_votes_no_overflow() {
        let alloc =
            allocate_dhondt(3, &votes(&[("A", u64::MAX / 2), ("B", u64::MAX / 3)])).unwrap();
        let total: u32 = alloc.values().sum();
        assert_eq!(total, 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn indexed_votes(raw: &[u64]) -> BTreeMap<PartyId, u64> {
            raw.iter()
                .enumerate()
                .map(|(i, &v)| (format!("p{i}").parse().unwrap(), v))
                .collect()
        }

        proptest! {
            #[test]
            fn every_seat_awarded_exactly_once(
                seats in 0u32..60,
                raw in proptest::collection::vec(0u64..1_000_000, 1..8),
            ) {
                let votes = indexed_votes(&raw);
                let contested = raw.iter().any(|&v| v > 0);
                match allocate_dhondt(seats, &votes) {
                    Ok(alloc) => {
                        let total: u32 = alloc.values().sum();
                        prop_assert_eq!(total, if contested { seats } else { 0 });
                        for (party, &v) in &votes {
                            if v == 0 {
                                prop_assert_eq!(alloc.get(party).copied().unwrap_or(0), 0);
                            }
                        }
                    }
                    Err(_) => prop_assert!(seats > 0 && !contested),
                }
            }

            #[test]
            fn more_votes_never_fewer_seats(
                seats in 1u32..40,
                raw in proptest::collection::vec(1u64..1_000_000, 2..8),
            ) {
                let votes = indexed_votes(&raw);
                let alloc = allocate_dhondt(seats, &votes).unwrap();
                let ranked: Vec<(&PartyId, &u64)> = votes.iter().collect();
                for (a, &va) in &ranked {
                    for (b, &vb) in &ranked {
                        if va > vb {
                            prop_assert!(alloc[*a] >= alloc[*b]);
                        }
                    }
                }
            }
        }
    }
}
