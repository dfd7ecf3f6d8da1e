use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Decimal, Uint128};

use crate::state::Status;

#[cw_serde]
pub struct InstantiateMsg {
    pub owner: String,
    pub arbiter: String,
    /// Share of the pool paid to the owner when a winner is named
    pub owner_fee: Decimal,
    /// Share of the pool (or of each drawn withdrawal) paid to the arbiter
    pub arbiter_fee: Decimal,
    pub denom: String,
    pub deal_id: u64,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Seeds the first participant. Only the instantiating factory may send it.
    CreateDeal { depositor: String, amount: Uint128 },
    AddUser { amount: Uint128, approve: bool },
    Approve {},
    Withdraw {},
    /// Names the winner, or declares a draw when `address` is not a participant.
    Reward { address: String },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(ConfigResponse)]
    Config {},
    #[returns(InfoResponse)]
    Info {},
    #[returns(ParticipantResponse)]
    Participant { address: String },
    #[returns(ParticipantsResponse)]
    Participants {
        start_after: Option<String>,
        limit: Option<u32>,
    },
}

#[cw_serde]
pub struct ConfigResponse {
    pub factory: String,
    pub owner: String,
    pub arbiter: String,
    pub owner_fee: Decimal,
    pub arbiter_fee: Decimal,
    pub denom: String,
    pub deal_id: u64,
}

#[cw_serde]
pub struct InfoResponse {
    pub status: Status,
    pub approved: bool,
    pub draw: bool,
    pub clock: u64,
    pub last_cancel: u64,
    pub participants: u32,
    pub balance: Uint128,
}

#[cw_serde]
pub struct ParticipantResponse {
    pub address: String,
    pub amount: Uint128,
    pub approved_at: Option<u64>,
    /// Approval is still valid since the last cancellation
    pub approved: bool,
    pub refused: bool,
}

#[cw_serde]
pub struct ParticipantsResponse {
    pub participants: Vec<ParticipantResponse>,
}
