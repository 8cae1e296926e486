use crate::events::TokenEventKind;
use alloy_primitives::{Address, B256, U256, address};

/// Mint source / burn destination by convention.
pub const GENESIS_ADDRESS: Address = Address::ZERO;
pub const DEAD_ADDRESS: Address = address!("000000000000000000000000000000000000dead");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mint,
    Burn,
    Transfer,
    BridgeIn,
    BridgeOut,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Mint => "mint",
            EventKind::Burn => "burn",
            EventKind::Transfer => "transfer",
            EventKind::BridgeIn => "bridge_in",
            EventKind::BridgeOut => "bridge_out",
        }
    }
}

/// An event reduced to the economic action it reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Mint {
        destination: Address,
        amount: U256,
    },
    Burn {
        burner: Address,
        amount: U256,
    },
    Transfer {
        source: Address,
        destination: Address,
        amount: U256,
    },
    BridgeIn {
        receiver: Address,
        amount: U256,
        src_chain_id: u16,
    },
    BridgeOut {
        sender: Address,
        receiver: B256,
        amount: U256,
        dst_chain_id: u16,
    },
}

impl ClassifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClassifiedEvent::Mint { .. } => EventKind::Mint,
            ClassifiedEvent::Burn { .. } => EventKind::Burn,
            ClassifiedEvent::Transfer { .. } => EventKind::Transfer,
            ClassifiedEvent::BridgeIn { .. } => EventKind::BridgeIn,
            ClassifiedEvent::BridgeOut { .. } => EventKind::BridgeOut,
        }
    }
}

pub fn is_burn_destination(to: &Address) -> bool {
    *to == GENESIS_ADDRESS || *to == DEAD_ADDRESS
}

pub fn is_mint_source(from: &Address) -> bool {
    *from == GENESIS_ADDRESS
}

/// Classify a transfer-shaped event. Burn is checked first, so
/// `from = zero, to = dead` is a burn.
pub fn classify_transfer(from: Address, to: Address, value: U256) -> ClassifiedEvent {
    if is_burn_destination(&to) {
        ClassifiedEvent::Burn {
            burner: from,
            amount: value,
        }
    } else if is_mint_source(&from) {
        ClassifiedEvent::Mint {
            destination: to,
            amount: value,
        }
    } else {
        ClassifiedEvent::Transfer {
            source: from,
            destination: to,
            amount: value,
        }
    }
}

/// Returns `None` when the event carries no economic value and must not
/// touch any state. Bridge events are always recorded.
pub fn classify(kind: &TokenEventKind) -> Option<ClassifiedEvent> {
    match *kind {
        TokenEventKind::Transfer { from, to, value } => {
            (!value.is_zero()).then(|| classify_transfer(from, to, value))
        }
        TokenEventKind::Mint { to, amount } => (!amount.is_zero()).then_some(ClassifiedEvent::Mint {
            destination: to,
            amount,
        }),
        TokenEventKind::Burn { burner, value } => {
            (!value.is_zero()).then_some(ClassifiedEvent::Burn {
                burner,
                amount: value,
            })
        }
        TokenEventKind::SendToChain {
            dst_chain_id,
            from,
            to_address,
            amount,
        } => Some(ClassifiedEvent::BridgeOut {
            sender: from,
            receiver: to_address,
            amount,
            dst_chain_id,
        }),
        TokenEventKind::ReceiveFromChain {
            src_chain_id,
            to,
            amount,
        } => Some(ClassifiedEvent::BridgeIn {
            receiver: to,
            amount,
            src_chain_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = address!("1111111111111111111111111111111111111111");
    const BOB: Address = address!("2222222222222222222222222222222222222222");

    fn transfer(from: Address, to: Address, value: u64) -> TokenEventKind {
        TokenEventKind::Transfer {
            from,
            to,
            value: U256::from(value),
        }
    }

    #[test]
    fn test_plain_transfer() {
        let event = classify(&transfer(ALICE, BOB, 10)).unwrap();
        assert_eq!(event.kind(), EventKind::Transfer);
    }

    #[test]
    fn test_mint_from_genesis() {
        let event = classify(&transfer(GENESIS_ADDRESS, ALICE, 10)).unwrap();
        assert_eq!(
            event,
            ClassifiedEvent::Mint {
                destination: ALICE,
                amount: U256::from(10u64)
            }
        );
    }

    #[test]
    fn test_burn_to_either_sentinel() {
        for sink in [GENESIS_ADDRESS, DEAD_ADDRESS] {
            let event = classify(&transfer(ALICE, sink, 10)).unwrap();
            assert_eq!(
                event,
                ClassifiedEvent::Burn {
                    burner: ALICE,
                    amount: U256::from(10u64)
                }
            );
        }
    }

    #[test]
    fn test_burn_wins_over_mint() {
        let event = classify(&transfer(GENESIS_ADDRESS, DEAD_ADDRESS, 10)).unwrap();
        assert_eq!(event.kind(), EventKind::Burn);

        let event = classify(&transfer(GENESIS_ADDRESS, GENESIS_ADDRESS, 10)).unwrap();
        assert_eq!(event.kind(), EventKind::Burn);
    }

    #[test]
    fn test_zero_value_is_discarded() {
        assert_eq!(classify(&transfer(ALICE, BOB, 0)), None);
        assert_eq!(classify(&transfer(GENESIS_ADDRESS, BOB, 0)), None);
        assert_eq!(
            classify(&TokenEventKind::Burn {
                burner: ALICE,
                value: U256::ZERO
            }),
            None
        );
    }

    #[test]
    fn test_zero_value_bridge_is_kept() {
        let event = classify(&TokenEventKind::ReceiveFromChain {
            src_chain_id: 101,
            to: ALICE,
            amount: U256::ZERO,
        });
        assert_eq!(event.map(|e| e.kind()), Some(EventKind::BridgeIn));
    }
}
