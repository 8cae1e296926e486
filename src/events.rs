use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256, U256};
use anyhow::{Context, Result};

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
    event Mint(address indexed to, uint256 amount);
    event Burn(address indexed burner, uint256 value);

    // LayerZero OFT v2
    event SendToChain(uint16 indexed dstChainId, address indexed from, bytes32 indexed toAddress, uint256 amount);
    event ReceiveFromChain(uint16 indexed srcChainId, address indexed to, uint256 amount);

    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

/// Topics the scanner subscribes to.
pub fn tracked_topics() -> Vec<B256> {
    vec![
        Transfer::SIGNATURE_HASH,
        Mint::SIGNATURE_HASH,
        Burn::SIGNATURE_HASH,
        SendToChain::SIGNATURE_HASH,
        ReceiveFromChain::SIGNATURE_HASH,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub number: u64,
    pub timestamp: u64,
}

/// Where a log came from. `token` is the emitting contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRef {
    pub token: Address,
    pub tx_hash: B256,
    pub log_index: u64,
    pub nonce: u64,
    pub block: BlockRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEventKind {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Mint {
        to: Address,
        amount: U256,
    },
    Burn {
        burner: Address,
        value: U256,
    },
    SendToChain {
        dst_chain_id: u16,
        from: Address,
        to_address: B256,
        amount: U256,
    },
    ReceiveFromChain {
        src_chain_id: u16,
        to: Address,
        amount: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEvent {
    pub log: LogRef,
    pub kind: TokenEventKind,
}

/// Decode the payload of a tracked log. Returns `None` for foreign topics.
pub fn decode_event_kind(log: &Log) -> Result<Option<TokenEventKind>> {
    let Some(topic0) = log.topics().first() else {
        return Ok(None);
    };
    let data = &log.data().data;

    let kind = if *topic0 == Transfer::SIGNATURE_HASH {
        let event = Transfer::decode_raw_log(log.topics(), data)?;
        TokenEventKind::Transfer {
            from: event.from,
            to: event.to,
            value: event.value,
        }
    } else if *topic0 == Mint::SIGNATURE_HASH {
        let event = Mint::decode_raw_log(log.topics(), data)?;
        TokenEventKind::Mint {
            to: event.to,
            amount: event.amount,
        }
    } else if *topic0 == Burn::SIGNATURE_HASH {
        let event = Burn::decode_raw_log(log.topics(), data)?;
        TokenEventKind::Burn {
            burner: event.burner,
            value: event.value,
        }
    } else if *topic0 == SendToChain::SIGNATURE_HASH {
        let event = SendToChain::decode_raw_log(log.topics(), data)?;
        TokenEventKind::SendToChain {
            dst_chain_id: event.dstChainId,
            from: event.from,
            to_address: event.toAddress,
            amount: event.amount,
        }
    } else if *topic0 == ReceiveFromChain::SIGNATURE_HASH {
        let event = ReceiveFromChain::decode_raw_log(log.topics(), data)?;
        TokenEventKind::ReceiveFromChain {
            src_chain_id: event.srcChainId,
            to: event.to,
            amount: event.amount,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(kind))
}

/// Position of a mined log. Pending logs have no position and are rejected.
pub fn log_position(log: &Log) -> Result<(B256, u64, u64)> {
    let tx_hash = log.transaction_hash.context("log without transaction hash")?;
    let log_index = log.log_index.context("log without log index")?;
    let block_number = log.block_number.context("log without block number")?;
    Ok((tx_hash, log_index, block_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    fn rpc_log(inner: alloy_primitives::LogData) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: address!("9e20461bc2c4c980f62f1b279d71734207a6a356"),
                data: inner,
            },
            transaction_hash: Some(b256!(
                "00000000000000000000000000000000000000000000000000000000000000ab"
            )),
            log_index: Some(3),
            block_number: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_transfer() {
        let from = address!("1111111111111111111111111111111111111111");
        let to = address!("2222222222222222222222222222222222222222");
        let data = Transfer {
            from,
            to,
            value: U256::from(40u64),
        }
        .encode_log_data();

        let kind = decode_event_kind(&rpc_log(data)).unwrap();
        assert_eq!(
            kind,
            Some(TokenEventKind::Transfer {
                from,
                to,
                value: U256::from(40u64)
            })
        );
    }

    #[test]
    fn test_decode_send_to_chain() {
        let from = address!("1111111111111111111111111111111111111111");
        let to_address = B256::left_padding_from(&[0xbe, 0xef]);
        let data = SendToChain {
            dstChainId: 110,
            from,
            toAddress: to_address,
            amount: U256::from(5u64),
        }
        .encode_log_data();

        let kind = decode_event_kind(&rpc_log(data)).unwrap();
        assert_eq!(
            kind,
            Some(TokenEventKind::SendToChain {
                dst_chain_id: 110,
                from,
                to_address,
                amount: U256::from(5u64)
            })
        );
    }

    #[test]
    fn test_foreign_topic_is_ignored() {
        let data =
            alloy_primitives::LogData::new_unchecked(vec![B256::repeat_byte(0x42)], Default::default());
        assert_eq!(decode_event_kind(&rpc_log(data)).unwrap(), None);
    }

    #[test]
    fn test_log_position() {
        let data = alloy_primitives::LogData::new_unchecked(vec![], Default::default());
        let (_, log_index, block) = log_position(&rpc_log(data)).unwrap();
        assert_eq!((log_index, block), (3, 42));

        let pending = Log::default();
        assert!(log_position(&pending).is_err());
    }
}
