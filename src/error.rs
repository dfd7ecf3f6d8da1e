use cosmwasm_std::{OverflowError, StdError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("Standard error: {0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    OverflowError(#[from] OverflowError),

    #[error("Must sent only one coin")]
    InvalidFundsLength {},
    #[error("Invalid funds denom")]
    InvalidFundsDenom {},
    #[error("Invalid funds amount")]
    InvalidFundsAmount {},
    #[error("Deposit amount must be positive")]
    InvalidAmount {},
    #[error("Owner and arbiter fees must not exceed the whole pool")]
    InvalidFee {},
    #[error("Denom cannot be empty")]
    InvalidDenom {},
    #[error("Unauthorized")]
    Unauthorized {},
    #[error("Sender is not a participant")]
    NotParticipant {},
    #[error("Deal is not approved by every participant")]
    NotReady {},
    #[error("Deal already ended in a draw")]
    AlreadyDraw {},
    #[error("Deal already created")]
    AlreadyCreated {},
    #[error("Deal not open")]
    DealNotOpen {},
    #[error("Participant forfeited their stake")]
    Forfeited {},
    #[error("Deal is full ({max} participants)")]
    TooManyParticipants { max: u32 },
}
