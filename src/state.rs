use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Decimal, Order, StdResult, Storage, Uint128};
use cw_storage_plus::{Item, Map};

/// Upper bound on the participant table. Quorum recomputation and the winner payout walk
/// the whole table, so its size caps the gas of every request.
pub const MAX_PARTICIPANTS: u32 = 50;

#[cw_serde]
pub enum Status {
    /// Instantiated, waiting for the factory to seed the first deposit
    Pending,
    Open,
    /// Pool paid out or swept to the owner, nothing is accepted anymore
    Dissolved,
}

#[cw_serde]
pub struct Config {
    pub factory: Addr,
    pub owner: Addr,
    pub arbiter: Addr,
    pub owner_fee: Decimal,
    pub arbiter_fee: Decimal,
    pub denom: String,
    pub deal_id: u64,
}

#[cw_serde]
pub struct Participant {
    pub amount: Uint128,
    pub approved_at: Option<u64>,
    pub refused: bool,
}

impl Participant {
    pub fn new(amount: Uint128) -> Self {
        Participant {
            amount,
            approved_at: None,
            refused: false,
        }
    }

    /// Whether the last approval is still valid after the cancellation at `last_cancel`.
    pub fn has_approved(&self, last_cancel: u64) -> bool {
        self.approved_at.map_or(false, |at| at >= last_cancel)
    }

    /// A refused participant counts towards quorum without approving.
    pub fn counts_for_quorum(&self, last_cancel: u64) -> bool {
        self.refused || self.has_approved(last_cancel)
    }
}

#[cw_serde]
pub struct DealState {
    pub status: Status,
    pub clock: u64,
    pub last_cancel: u64,
    pub approved: bool,
    pub draw: bool,
    /// Number of entries in `PARTICIPANTS`
    pub participants: u32,
}

impl DealState {
    pub fn new() -> Self {
        DealState {
            status: Status::Pending,
            clock: 0,
            last_cancel: 0,
            approved: false,
            draw: false,
            participants: 0,
        }
    }

    /// Advances the logical clock and returns the new time.
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Recomputes the cached quorum flag from the participant table.
    /// Must run after every mutation of `PARTICIPANTS` or `last_cancel`.
    pub fn refresh_approval(&mut self, storage: &dyn Storage) -> StdResult<()> {
        if self.participants < 2 {
            self.approved = false;
            return Ok(());
        }
        let mut unanimous = true;
        for item in PARTICIPANTS.range(storage, None, None, Order::Ascending) {
            let (_, participant) = item?;
            if !participant.counts_for_quorum(self.last_cancel) {
                unanimous = false;
                break;
            }
        }
        self.approved = unanimous;
        Ok(())
    }
}

impl Default for DealState {
    fn default() -> Self {
        Self::new()
    }
}

pub const CONFIG: Item<Config> = Item::new("config");

pub const STATE: Item<DealState> = Item::new("state");

// maps depositor => participant
pub const PARTICIPANTS: Map<&Addr, Participant> = Map::new("participants");

#[cfg(test)]
mod tests {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    fn participant(approved_at: Option<u64>, refused: bool) -> Participant {
        Participant {
            amount: Uint128::new(10),
            approved_at,
            refused,
        }
    }

    #[test]
    fn approval_expires_with_later_cancel() {
        let p = participant(Some(3), false);
        assert!(p.has_approved(0));
        assert!(p.has_approved(3));
        assert!(!p.has_approved(4));
        assert!(!participant(None, false).counts_for_quorum(0));
        assert!(participant(None, true).counts_for_quorum(100));
    }

    #[test]
    fn tick_is_strictly_increasing() {
        let mut state = DealState::new();
        let first = state.tick();
        let second = state.tick();
        assert_eq!(first, 1);
        assert!(second > first);
        assert!(first > state.last_cancel);
    }

    #[test]
    fn quorum_needs_two_satisfied_participants() {
        let mut storage = MockStorage::new();
        let mut state = DealState::new();
        let alice = Addr::unchecked("alice");
        let bob = Addr::unchecked("bob");

        state.refresh_approval(&storage).unwrap();
        assert!(!state.approved);

        PARTICIPANTS
            .save(&mut storage, &alice, &participant(Some(1), false))
            .unwrap();
        state.participants = 1;
        state.refresh_approval(&storage).unwrap();
        assert!(!state.approved);

        PARTICIPANTS
            .save(&mut storage, &bob, &participant(None, false))
            .unwrap();
        state.participants = 2;
        state.refresh_approval(&storage).unwrap();
        assert!(!state.approved);

        PARTICIPANTS
            .save(&mut storage, &bob, &participant(None, true))
            .unwrap();
        state.refresh_approval(&storage).unwrap();
        assert!(state.approved);

        state.last_cancel = 2;
        state.refresh_approval(&storage).unwrap();
        assert!(!state.approved);
    }
}
