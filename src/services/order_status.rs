//! Order status state machine.
//!
//! Pure functions only: the orders service decides *whether* a move is legal
//! here and performs the write itself inside its transaction.

use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;

/// Minutes the kitchen may quote when an order goes into preparation.
pub const PREPARE_DURATIONS: [i32; 4] = [5, 10, 15, 20];

/// Statuses reachable from `from` in one step, excluding the no-op self move.
pub fn allowed_next(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled, Refunded],
        Confirmed => &[Preparing, Cancelled, Refunded],
        Preparing => &[Delivered, Cancelled, Refunded],
        Delivered => &[Refunded],
        Cancelled | Refunded => &[],
    }
}

/// What applying a requested status would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same non-terminal status again; timestamps are left alone.
    Unchanged,
    /// A real move to a new status.
    Advance,
}

/// Checks `from -> to` against the transition table.
///
/// Terminal orders reject every request, including a repeat of their own
/// status.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<Transition, ServiceError> {
    if from.is_terminal() {
        return Err(ServiceError::InvalidOperation(format!(
            "Order is already {from} and can no longer change status"
        )));
    }
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if allowed_next(from).contains(&to) {
        Ok(Transition::Advance)
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Cannot move order from {from} to {to}"
        )))
    }
}

/// Parses a user supplied status string.
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<OrderStatus>()
        .map_err(|_| ServiceError::InvalidStatus(format!("Invalid status '{}'", raw.trim())))
}

/// A preparation estimate is mandatory and must be one of [`PREPARE_DURATIONS`].
pub fn validate_prepare_duration(minutes: Option<i32>) -> Result<i32, ServiceError> {
    match minutes {
        Some(m) if PREPARE_DURATIONS.contains(&m) => Ok(m),
        Some(m) => Err(ServiceError::ValidationError(format!(
            "prepare_duration must be one of {PREPARE_DURATIONS:?} minutes, got {m}"
        ))),
        None => Err(ServiceError::ValidationError(
            "prepare_duration is required when moving an order to preparing".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::Iterable;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Confirmed)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled)]
    #[case(OrderStatus::Confirmed, OrderStatus::Preparing)]
    #[case(OrderStatus::Preparing, OrderStatus::Delivered)]
    #[case(OrderStatus::Preparing, OrderStatus::Cancelled)]
    #[case(OrderStatus::Delivered, OrderStatus::Refunded)]
    fn forward_moves_advance(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert_eq!(check_transition(from, to).unwrap(), Transition::Advance);
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Delivered)]
    #[case(OrderStatus::Pending, OrderStatus::Preparing)]
    #[case(OrderStatus::Preparing, OrderStatus::Confirmed)]
    #[case(OrderStatus::Delivered, OrderStatus::Cancelled)]
    #[case(OrderStatus::Delivered, OrderStatus::Pending)]
    fn skipping_or_reversing_is_rejected(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert_matches!(
            check_transition(from, to),
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            for to in OrderStatus::iter() {
                assert!(check_transition(from, to).is_err(), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn repeating_an_active_status_is_a_no_op() {
        for status in OrderStatus::iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                check_transition(status, status).unwrap(),
                Transition::Unchanged
            );
        }
    }

    #[test]
    fn parse_status_accepts_case_and_whitespace() {
        assert_eq!(parse_status(" Preparing ").unwrap(), OrderStatus::Preparing);
        assert_matches!(parse_status("shipped"), Err(ServiceError::InvalidStatus(_)));
    }

    #[rstest]
    #[case(Some(5), true)]
    #[case(Some(20), true)]
    #[case(Some(7), false)]
    #[case(Some(0), false)]
    #[case(None, false)]
    fn prepare_duration_whitelist(#[case] minutes: Option<i32>, #[case] ok: bool) {
        assert_eq!(validate_prepare_duration(minutes).is_ok(), ok);
    }
}
