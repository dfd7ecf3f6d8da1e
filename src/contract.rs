#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;

use crate::error::ContractError;
use crate::msg::{
    ConfigResponse, ExecuteMsg, InfoResponse, InstantiateMsg, ParticipantResponse,
    ParticipantsResponse, QueryMsg,
};
use crate::state::{
    Config, DealState, Participant, Status, CONFIG, MAX_PARTICIPANTS, PARTICIPANTS, STATE,
};

use cw2::set_contract_version;
use cw_storage_plus::Bound;

use cosmwasm_std::{
    coins, to_json_binary, Addr, BankMsg, Binary, Decimal, Deps, DepsMut, Env, MessageInfo, Order,
    Response, StdResult, Uint128,
};

const CONTRACT_NAME: &str = "crates.io:arbiter-escrow";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 30;

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    if msg.owner_fee.checked_add(msg.arbiter_fee)? > Decimal::one() {
        return Err(ContractError::InvalidFee {});
    }

    if msg.denom.is_empty() {
        return Err(ContractError::InvalidDenom {});
    }

    let config = Config {
        factory: info.sender,
        owner: deps.api.addr_validate(&msg.owner)?,
        arbiter: deps.api.addr_validate(&msg.arbiter)?,
        owner_fee: msg.owner_fee,
        arbiter_fee: msg.arbiter_fee,
        denom: msg.denom,
        deal_id: msg.deal_id,
    };
    CONFIG.save(deps.storage, &config)?;
    STATE.save(deps.storage, &DealState::new())?;

    Ok(Response::new()
        .add_attribute("action", "instantiate")
        .add_attribute("deal_id", config.deal_id.to_string())
        .add_attribute("owner", config.owner)
        .add_attribute("arbiter", config.arbiter)
        .add_attribute("owner_fee", config.owner_fee.to_string())
        .add_attribute("arbiter_fee", config.arbiter_fee.to_string()))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::CreateDeal { depositor, amount } => {
            try_create_deal(deps, info, depositor, amount)
        }
        ExecuteMsg::AddUser { amount, approve } => try_add_user(deps, info, amount, approve),
        ExecuteMsg::Approve {} => try_approve(deps, info),
        ExecuteMsg::Withdraw {} => try_withdraw(deps, env, info),
        ExecuteMsg::Reward { address } => try_reward(deps, env, info, address),
    }
}

/// Seeds the first participant on behalf of the factory and sends back whatever was
/// attached on top of the deposit.
fn try_create_deal(
    deps: DepsMut,
    info: MessageInfo,
    depositor: String,
    amount: Uint128,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.factory {
        return Err(ContractError::Unauthorized {});
    }

    let mut state = STATE.load(deps.storage)?;
    if state.status != Status::Pending {
        return Err(ContractError::AlreadyCreated {});
    }

    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {});
    }

    let paid = one_coin(&info, &config.denom)?;
    if paid < amount {
        return Err(ContractError::InvalidFundsAmount {});
    }

    let depositor = deps.api.addr_validate(&depositor)?;
    PARTICIPANTS.save(deps.storage, &depositor, &Participant::new(amount))?;

    state.status = Status::Open;
    state.participants = 1;
    state.refresh_approval(deps.storage)?;
    STATE.save(deps.storage, &state)?;

    let excess = paid.checked_sub(amount)?;

    Ok(Response::new()
        .add_attribute("action", "create_deal")
        .add_attribute("deal_id", config.deal_id.to_string())
        .add_attribute("depositor", depositor.as_str())
        .add_attribute("amount", amount.to_string())
        .add_attribute("excess", excess.to_string())
        .add_messages(transfer(&depositor, excess, &config.denom)))
}

/// Deposits into the pool, creating the participant on first deposit. The approval flag
/// only counts once somebody else is in the deal.
fn try_add_user(
    deps: DepsMut,
    info: MessageInfo,
    amount: Uint128,
    approve: bool,
) -> Result<Response, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {});
    }

    let config = CONFIG.load(deps.storage)?;
    let mut state = STATE.load(deps.storage)?;
    ensure_open(&state)?;

    if one_coin(&info, &config.denom)? != amount {
        return Err(ContractError::InvalidFundsAmount {});
    }

    let mut participant = match PARTICIPANTS.may_load(deps.storage, &info.sender)? {
        // new money never joins a stake that is already forfeited
        Some(existing) if existing.refused => return Err(ContractError::Forfeited {}),
        Some(existing) => existing,
        None => {
            if state.participants >= MAX_PARTICIPANTS {
                return Err(ContractError::TooManyParticipants {
                    max: MAX_PARTICIPANTS,
                });
            }
            state.participants += 1;
            Participant::new(Uint128::zero())
        }
    };
    participant.amount = participant.amount.checked_add(amount)?;

    if approve && state.participants > 1 {
        participant.approved_at = Some(state.tick());
    }
    PARTICIPANTS.save(deps.storage, &info.sender, &participant)?;

    state.refresh_approval(deps.storage)?;
    STATE.save(deps.storage, &state)?;

    Ok(Response::new()
        .add_attribute("action", "add_user")
        .add_attribute("sender", info.sender.as_str())
        .add_attribute("amount", amount.to_string())
        .add_attribute("total", participant.amount.to_string())
        .add_attribute("approved", state.approved.to_string()))
}

fn try_approve(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let mut state = STATE.load(deps.storage)?;
    ensure_open(&state)?;

    let mut participant = PARTICIPANTS
        .may_load(deps.storage, &info.sender)?
        .ok_or(ContractError::NotParticipant {})?;

    let approved_at = state.tick();
    participant.approved_at = Some(approved_at);
    PARTICIPANTS.save(deps.storage, &info.sender, &participant)?;

    state.refresh_approval(deps.storage)?;
    STATE.save(deps.storage, &state)?;

    Ok(Response::new()
        .add_attribute("action", "approve")
        .add_attribute("sender", info.sender.as_str())
        .add_attribute("approved_at", approved_at.to_string())
        .add_attribute("approved", state.approved.to_string()))
}

/// Before quorum (or after a draw) a withdrawal refunds the deposit and cancels every
/// other approval. Once the deal is approved it turns into a forfeiture instead.
fn try_withdraw(deps: DepsMut, env: Env, info: MessageInfo) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let mut state = STATE.load(deps.storage)?;
    ensure_open(&state)?;

    let mut participant = PARTICIPANTS
        .may_load(deps.storage, &info.sender)?
        .ok_or(ContractError::NotParticipant {})?;

    if state.approved && !state.draw {
        participant.refused = true;
        PARTICIPANTS.save(deps.storage, &info.sender, &participant)?;
        state.refresh_approval(deps.storage)?;
        STATE.save(deps.storage, &state)?;

        return Ok(Response::new()
            .add_attribute("action", "withdraw")
            .add_attribute("sender", info.sender.as_str())
            .add_attribute("outcome", "forfeit")
            .add_attribute("forfeited", participant.amount.to_string()));
    }

    PARTICIPANTS.remove(deps.storage, &info.sender);
    state.participants -= 1;

    // a forfeited stake stays in the pool until the final sweep
    let (refund, arbiter_fee) = if participant.refused {
        (Uint128::zero(), Uint128::zero())
    } else if state.draw {
        let charge = fee(participant.amount, config.arbiter_fee);
        (participant.amount.checked_sub(charge)?, charge)
    } else {
        (participant.amount, Uint128::zero())
    };

    let mut messages = transfer(&info.sender, refund, &config.denom);
    messages.extend(transfer(&config.arbiter, arbiter_fee, &config.denom));

    let residual = if state.participants == 0 {
        let balance = pool_balance(deps.as_ref(), &env, &config)?;
        let residual = balance.checked_sub(refund.checked_add(arbiter_fee)?)?;
        messages.extend(transfer(&config.owner, residual, &config.denom));
        state.status = Status::Dissolved;
        residual
    } else {
        state.last_cancel = state.tick();
        Uint128::zero()
    };

    state.refresh_approval(deps.storage)?;
    STATE.save(deps.storage, &state)?;

    Ok(Response::new()
        .add_attribute("action", "withdraw")
        .add_attribute("sender", info.sender.as_str())
        .add_attribute("outcome", if state.draw { "draw_refund" } else { "refund" })
        .add_attribute("refund", refund.to_string())
        .add_attribute("arbiter_fee", arbiter_fee.to_string())
        .add_attribute("residual", residual.to_string())
        .add_messages(messages))
}

/// Arbiter verdict. A participant as `address` takes the pool minus fees; anything else
/// declares a draw and leaves settlement to withdrawals.
fn try_reward(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    address: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.arbiter {
        return Err(ContractError::Unauthorized {});
    }

    let mut state = STATE.load(deps.storage)?;
    ensure_open(&state)?;

    if state.draw {
        return Err(ContractError::AlreadyDraw {});
    }

    if !state.approved {
        return Err(ContractError::NotReady {});
    }

    let winner = match deps.api.addr_validate(&address) {
        Ok(addr) => PARTICIPANTS
            .may_load(deps.storage, &addr)?
            .map(|participant| (addr, participant)),
        Err(_) => None,
    };

    let (winner, participant) = match winner {
        Some(found) => found,
        None => {
            state.draw = true;
            STATE.save(deps.storage, &state)?;

            return Ok(Response::new()
                .add_attribute("action", "reward")
                .add_attribute("outcome", "draw")
                .add_attribute("address", address));
        }
    };

    if participant.refused {
        return Err(ContractError::Forfeited {});
    }

    let pool = pool_balance(deps.as_ref(), &env, &config)?;
    let owner_fee = fee(pool, config.owner_fee);
    let arbiter_fee = fee(pool, config.arbiter_fee);
    let payout = pool.checked_sub(owner_fee)?.checked_sub(arbiter_fee)?;

    let depositors = PARTICIPANTS
        .keys(deps.storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<Addr>>>()?;
    for depositor in depositors {
        PARTICIPANTS.remove(deps.storage, &depositor);
    }

    state.status = Status::Dissolved;
    state.participants = 0;
    state.refresh_approval(deps.storage)?;
    STATE.save(deps.storage, &state)?;

    let mut messages = transfer(&winner, payout, &config.denom);
    messages.extend(transfer(&config.owner, owner_fee, &config.denom));
    messages.extend(transfer(&config.arbiter, arbiter_fee, &config.denom));

    Ok(Response::new()
        .add_attribute("action", "reward")
        .add_attribute("outcome", "winner")
        .add_attribute("winner", winner.as_str())
        .add_attribute("payout", payout.to_string())
        .add_attribute("owner_fee", owner_fee.to_string())
        .add_attribute("arbiter_fee", arbiter_fee.to_string())
        .add_messages(messages))
}

fn ensure_open(state: &DealState) -> Result<(), ContractError> {
    if state.status != Status::Open {
        return Err(ContractError::DealNotOpen {});
    }
    Ok(())
}

fn one_coin(info: &MessageInfo, denom: &str) -> Result<Uint128, ContractError> {
    if info.funds.len() != 1 {
        return Err(ContractError::InvalidFundsLength {});
    }

    if info.funds[0].denom != denom {
        return Err(ContractError::InvalidFundsDenom {});
    }

    Ok(info.funds[0].amount)
}

/// Rounds down, the remainder stays with whoever receives the rest.
fn fee(amount: Uint128, rate: Decimal) -> Uint128 {
    amount * rate
}

fn pool_balance(deps: Deps, env: &Env, config: &Config) -> StdResult<Uint128> {
    Ok(deps
        .querier
        .query_balance(&env.contract.address, &config.denom)?
        .amount)
}

// zero-coin bank sends fail on chain, so they are skipped
fn transfer(to: &Addr, amount: Uint128, denom: &str) -> Vec<BankMsg> {
    if amount.is_zero() {
        return vec![];
    }
    vec![BankMsg::Send {
        to_address: to.to_string(),
        amount: coins(amount.u128(), denom),
    }]
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_json_binary(&query_config(deps)?),
        QueryMsg::Info {} => to_json_binary(&query_info(deps, env)?),
        QueryMsg::Participant { address } => {
            to_json_binary(&query_participant(deps, address)?)
        }
        QueryMsg::Participants { start_after, limit } => {
            to_json_binary(&query_participants(deps, start_after, limit)?)
        }
    }
}

fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        factory: config.factory.to_string(),
        owner: config.owner.to_string(),
        arbiter: config.arbiter.to_string(),
        owner_fee: config.owner_fee,
        arbiter_fee: config.arbiter_fee,
        denom: config.denom,
        deal_id: config.deal_id,
    })
}

fn query_info(deps: Deps, env: Env) -> StdResult<InfoResponse> {
    let config = CONFIG.load(deps.storage)?;
    let state = STATE.load(deps.storage)?;
    Ok(InfoResponse {
        status: state.status,
        approved: state.approved,
        draw: state.draw,
        clock: state.clock,
        last_cancel: state.last_cancel,
        participants: state.participants,
        balance: pool_balance(deps, &env, &config)?,
    })
}

fn query_participant(deps: Deps, address: String) -> StdResult<ParticipantResponse> {
    let state = STATE.load(deps.storage)?;
    let addr = deps.api.addr_validate(&address)?;
    let participant = PARTICIPANTS.load(deps.storage, &addr)?;
    Ok(participant_response(addr, participant, state.last_cancel))
}

fn query_participants(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<ParticipantsResponse> {
    let state = STATE.load(deps.storage)?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start = start_after
        .map(|addr| deps.api.addr_validate(&addr))
        .transpose()?;

    let participants = PARTICIPANTS
        .range(
            deps.storage,
            start.as_ref().map(Bound::exclusive),
            None,
            Order::Ascending,
        )
        .take(limit)
        .map(|item| {
            item.map(|(addr, participant)| {
                participant_response(addr, participant, state.last_cancel)
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(ParticipantsResponse { participants })
}

fn participant_response(
    addr: Addr,
    participant: Participant,
    last_cancel: u64,
) -> ParticipantResponse {
    ParticipantResponse {
        address: addr.to_string(),
        amount: participant.amount,
        approved_at: participant.approved_at,
        approved: participant.has_approved(last_cancel),
        refused: participant.refused,
    }
}
