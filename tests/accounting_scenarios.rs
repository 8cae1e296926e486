use alloy_primitives::{Address, B256, U256, address};
use erc20_accounting::accounting::{Accountant, Outcome};
use erc20_accounting::bucket::Cadence;
use erc20_accounting::chain_reads::PrefetchedChainReads;
use erc20_accounting::classifier::{DEAD_ADDRESS, EventKind, GENESIS_ADDRESS};
use erc20_accounting::collaborators::{AccountBalanceLedger, SupplyUnavailable};
use erc20_accounting::error::AccountingError;
use erc20_accounting::events::{BlockRef, LogRef, TokenEvent, TokenEventKind};
use erc20_accounting::keys::{address_hex, hash_hex, token_id};
use erc20_accounting::repository::{
    BalanceRepository, BridgeDirection, Database, MemoryLedger, ProgressRepository,
    SnapshotRepository, TokenMetadata, TokenRepository, TransferRepository,
};
use erc20_accounting::scanner::apply_once;
use std::collections::HashMap;

const TOKEN: Address = address!("9e20461bc2c4c980f62f1b279d71734207a6a356");
const PROXY: Address = address!("a0aa943666b4309c1989e3a7ebe7dbe11de36212");
const ALICE: Address = address!("1111111111111111111111111111111111111111");
const BOB: Address = address!("2222222222222222222222222222222222222222");

fn tid() -> String {
    token_id(&TOKEN)
}

fn amount(value: u64) -> U256 {
    U256::from(value)
}

fn event(token: Address, block: u64, timestamp: u64, log_index: u64, kind: TokenEventKind) -> TokenEvent {
    TokenEvent {
        log: LogRef {
            token,
            tx_hash: B256::left_padding_from(&block.to_be_bytes()),
            log_index,
            nonce: block,
            block: BlockRef {
                number: block,
                timestamp,
            },
        },
        kind,
    }
}

fn transfer(from: Address, to: Address, value: u64) -> TokenEventKind {
    TokenEventKind::Transfer {
        from,
        to,
        value: amount(value),
    }
}

fn accountant() -> Accountant {
    Accountant::new(HashMap::new())
}

/// Apply events in order with no chain supply available.
fn replay(ledger: &mut MemoryLedger, events: &[TokenEvent]) -> Vec<Outcome> {
    let accountant = accountant();
    let reads = PrefetchedChainReads::default();
    events
        .iter()
        .map(|e| accountant.apply_event(ledger, &reads, &SupplyUnavailable, e).unwrap())
        .collect()
}

#[test]
fn test_mint_transfer_burn_sequence() {
    let mut ledger = MemoryLedger::default();
    let outcomes = replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 1_000, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
            event(TOKEN, 2, 1_012, 0, transfer(ALICE, BOB, 40)),
            event(TOKEN, 3, 1_024, 0, transfer(ALICE, DEAD_ADDRESS, 60)),
        ],
    );

    assert_eq!(
        outcomes,
        vec![
            Outcome::Applied(EventKind::Mint),
            Outcome::Applied(EventKind::Transfer),
            Outcome::Applied(EventKind::Burn),
        ]
    );

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.total_supply, amount(40));
    assert_eq!(token.total_minted, amount(100));
    assert_eq!(token.total_burned, amount(60));
    assert_eq!(token.current_holder_count, 1);
    assert_eq!(token.cumulative_holder_count, 2);
    assert_eq!((token.mint_count, token.transfer_count, token.burn_count), (1, 1, 1));

    assert_eq!(ledger.balance(ALICE, &tid()), U256::ZERO);
    assert_eq!(ledger.balance(BOB, &tid()), amount(40));
    assert_eq!(ledger.transfer_event_count(), 1);
}

#[test]
fn test_metadata_resolved_on_first_sight() {
    let mut ledger = MemoryLedger::default();
    let reads = PrefetchedChainReads::new(18).with_metadata(
        TOKEN,
        TokenMetadata {
            name: "Zama".to_string(),
            symbol: "ZAMA".to_string(),
            decimals: 18,
        },
    );
    accountant()
        .apply_event(
            &mut ledger,
            &reads,
            &SupplyUnavailable,
            &event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 5)),
        )
        .unwrap();

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.name.as_deref(), Some("Zama"));
    assert_eq!(token.symbol.as_deref(), Some("ZAMA"));
    assert_eq!(token.decimals, Some(18));
}

#[test]
fn test_unreadable_metadata_falls_back_to_defaults() {
    let mut ledger = MemoryLedger::default();
    replay(
        &mut ledger,
        &[event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 5))],
    );

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.name.as_deref(), Some(""));
    assert_eq!(token.decimals, Some(18));
}

#[test]
fn test_self_transfer_moves_nothing() {
    let mut ledger = MemoryLedger::default();
    replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
            event(TOKEN, 2, 20, 0, transfer(ALICE, ALICE, 100)),
        ],
    );

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.transfer_count, 1);
    assert_eq!(token.current_holder_count, 1);
    assert_eq!(token.cumulative_holder_count, 1);
    assert_eq!(ledger.balance(ALICE, &tid()), amount(100));
}

#[test]
fn test_zero_amount_is_discarded() {
    let mut ledger = MemoryLedger::default();
    let outcomes = replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 0)),
            event(TOKEN, 1, 10, 1, transfer(ALICE, BOB, 0)),
        ],
    );

    assert_eq!(outcomes, vec![Outcome::Discarded, Outcome::Discarded]);
    assert!(ledger.token(&tid()).is_none());
    assert_eq!(ledger.transfer_event_count(), 0);
    assert!(!ledger.has_balance_record(ALICE, &tid()));
}

#[test]
fn test_dual_emitted_mint_and_burn_apply_once() {
    let mut ledger = MemoryLedger::default();
    let accountant = accountant();
    let reads = PrefetchedChainReads::default()
        .with_supply(TOKEN, 1, amount(100))
        .with_supply(TOKEN, 2, amount(60));

    let events = [
        event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
        event(
            TOKEN,
            1,
            10,
            1,
            TokenEventKind::Mint {
                to: ALICE,
                amount: amount(100),
            },
        ),
        event(TOKEN, 2, 20, 0, transfer(ALICE, GENESIS_ADDRESS, 40)),
        event(
            TOKEN,
            2,
            20,
            1,
            TokenEventKind::Burn {
                burner: ALICE,
                value: amount(40),
            },
        ),
    ];
    let outcomes: Vec<_> = events
        .iter()
        .map(|e| accountant.apply_event(&mut ledger, &reads, &reads, e).unwrap())
        .collect();

    assert_eq!(
        outcomes,
        vec![
            Outcome::Applied(EventKind::Mint),
            Outcome::AlreadyApplied(EventKind::Mint),
            Outcome::Applied(EventKind::Burn),
            Outcome::AlreadyApplied(EventKind::Burn),
        ]
    );

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.total_supply, amount(60));
    assert_eq!((token.mint_count, token.burn_count), (1, 1));
    assert_eq!(ledger.balance(ALICE, &tid()), amount(60));

    let daily = ledger.snapshot(Cadence::Daily, &format!("{}-0", tid())).unwrap();
    assert_eq!(daily.event_count, 2);
}

#[test]
fn test_dead_address_burn_with_burn_log_applies_once() {
    let mut ledger = MemoryLedger::default();
    let accountant = accountant();
    let reads = PrefetchedChainReads::default().with_supply(TOKEN, 2, amount(60));

    replay(
        &mut ledger,
        &[event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 100))],
    );
    let outcomes: Vec<_> = [
        event(TOKEN, 2, 20, 0, transfer(ALICE, DEAD_ADDRESS, 40)),
        event(
            TOKEN,
            2,
            20,
            1,
            TokenEventKind::Burn {
                burner: ALICE,
                value: amount(40),
            },
        ),
    ]
    .iter()
    .map(|e| accountant.apply_event(&mut ledger, &reads, &reads, e).unwrap())
    .collect();

    assert_eq!(
        outcomes,
        vec![
            Outcome::Applied(EventKind::Burn),
            Outcome::AlreadyApplied(EventKind::Burn),
        ]
    );

    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.total_supply, amount(60));
    assert_eq!(token.total_burned, amount(40));
    assert_eq!(token.burn_count, 1);
    assert_eq!(ledger.balance(ALICE, &tid()), amount(60));
    assert!(!ledger.has_balance_record(DEAD_ADDRESS, &tid()));
    assert_eq!(ledger.transfer_event_count(), 0);
}

#[test]
fn test_restart_skips_logs_committed_before_the_block_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounting.db");
    let accountant = accountant();
    let reads = PrefetchedChainReads::default();
    let mint = event(TOKEN, 10, 100, 0, transfer(GENESIS_ADDRESS, ALICE, 100));
    let payment = event(TOKEN, 10, 100, 1, transfer(ALICE, BOB, 30));

    {
        let mut db = Database::new(path.to_str().unwrap()).unwrap();
        ProgressRepository::new(&db.conn).insert(&TOKEN, 10).unwrap();
        let outcome = apply_once(&mut db, &accountant, &reads, &mint).unwrap();
        assert_eq!(outcome, Some(Outcome::Applied(EventKind::Mint)));
        // Stopped before the block cursor of the batch was written.
    }

    let mut db = Database::new(path.to_str().unwrap()).unwrap();
    let progress = ProgressRepository::new(&db.conn);
    assert_eq!(progress.get_last_processed_block(&TOKEN).unwrap(), None);
    assert_eq!(progress.last_applied_log(&TOKEN).unwrap(), Some((10, 0)));

    assert_eq!(apply_once(&mut db, &accountant, &reads, &mint).unwrap(), None);
    assert_eq!(
        apply_once(&mut db, &accountant, &reads, &payment).unwrap(),
        Some(Outcome::Applied(EventKind::Transfer))
    );
    assert_eq!(apply_once(&mut db, &accountant, &reads, &payment).unwrap(), None);

    let token = TokenRepository::new(&db.conn).load(&tid()).unwrap().unwrap();
    assert_eq!(token.total_supply, amount(100));
    assert_eq!((token.mint_count, token.transfer_count), (1, 1));

    let balances = BalanceRepository::new(&db.conn);
    assert_eq!(balances.get_or_create(&ALICE, &tid()).unwrap().amount, amount(70));
    assert_eq!(balances.get_or_create(&BOB, &tid()).unwrap().amount, amount(30));
}

#[test]
fn test_failed_log_does_not_move_the_log_cursor() {
    let mut db = Database::in_memory().unwrap();
    let accountant = accountant();
    let reads = PrefetchedChainReads::default();

    apply_once(
        &mut db,
        &accountant,
        &reads,
        &event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
    )
    .unwrap();
    let overdraft = event(TOKEN, 2, 20, 0, transfer(BOB, DEAD_ADDRESS, 500));
    assert!(apply_once(&mut db, &accountant, &reads, &overdraft).is_err());

    let progress = ProgressRepository::new(&db.conn);
    assert_eq!(progress.last_applied_log(&TOKEN).unwrap(), Some((1, 0)));
}

#[test]
fn test_day_boundary_opens_new_snapshot() {
    let mut ledger = MemoryLedger::default();
    replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 86_399, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
            event(TOKEN, 2, 86_400, 0, transfer(ALICE, BOB, 30)),
        ],
    );

    let first = ledger.snapshot(Cadence::Daily, &format!("{}-0", tid())).unwrap();
    assert_eq!((first.event_count, first.mint_count), (1, 1));
    assert_eq!(first.current_holder_count, 1);

    let second = ledger.snapshot(Cadence::Daily, &format!("{}-1", tid())).unwrap();
    let token = ledger.token(&tid()).unwrap();
    assert_eq!(second.event_count, 1);
    assert_eq!(second.mint_count, 0);
    assert_eq!(second.transfer_amount, amount(30));
    assert_eq!(second.total_supply, token.total_supply);
    assert_eq!(second.current_holder_count, token.current_holder_count);
    assert_eq!(second.cumulative_holder_count, token.cumulative_holder_count);
    assert_eq!((second.block_number, second.timestamp), (2, 86_400));
}

#[test]
fn test_daily_and_hourly_agree_within_an_hour() {
    let mut ledger = MemoryLedger::default();
    replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 7_200, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
            event(TOKEN, 2, 7_210, 0, transfer(ALICE, BOB, 10)),
            event(TOKEN, 3, 7_220, 0, transfer(BOB, DEAD_ADDRESS, 10)),
        ],
    );

    let daily = ledger.snapshot(Cadence::Daily, &format!("{}-0", tid())).unwrap();
    let hourly = ledger.snapshot(Cadence::Hourly, &format!("{}-2", tid())).unwrap();
    assert_eq!(daily.event_count, 3);
    assert_eq!(daily.event_count, hourly.event_count);
    assert_eq!(daily.mint_amount, hourly.mint_amount);
    assert_eq!(daily.burn_amount, hourly.burn_amount);
    assert_eq!(daily.transfer_amount, hourly.transfer_amount);
    assert_eq!(daily.total_supply, hourly.total_supply);
    assert_eq!(daily.current_holder_count, hourly.current_holder_count);
}

#[test]
fn test_bridge_events_through_alias() {
    let mut ledger = MemoryLedger::default();
    let accountant = Accountant::new(HashMap::from([(PROXY, TOKEN)]));
    let reads = PrefetchedChainReads::default();
    let remote = B256::left_padding_from(BOB.as_slice());

    let send = event(
        PROXY,
        5,
        100,
        2,
        TokenEventKind::SendToChain {
            dst_chain_id: 110,
            from: ALICE,
            to_address: remote,
            amount: amount(25),
        },
    );
    let receive = event(
        PROXY,
        6,
        200,
        0,
        TokenEventKind::ReceiveFromChain {
            src_chain_id: 101,
            to: BOB,
            amount: amount(0),
        },
    );

    for e in [&send, &receive] {
        accountant.apply_event(&mut ledger, &reads, &reads, e).unwrap();
    }

    assert!(ledger.token(&token_id(&PROXY)).is_none());
    let token = ledger.token(&tid()).unwrap();
    assert_eq!(token.lz_total_bridged_out, amount(25));
    assert_eq!(token.lz_total_bridged_out_count, 1);
    assert_eq!(token.lz_total_bridged_in_count, 1);
    assert_eq!(token.total_supply, U256::ZERO);
    assert_eq!(ledger.bridge_event_count(), 2);

    let id = format!("{}-{}-2", tid(), hash_hex(&send.log.tx_hash));
    let recorded = ledger.bridge_event(&id).unwrap();
    assert_eq!(recorded.token, tid());
    assert_eq!(recorded.direction, BridgeDirection::Out);
    assert_eq!(recorded.from.as_deref(), Some(address_hex(&ALICE).as_str()));
    assert_eq!(recorded.destination_chain_id.as_deref(), Some("110"));

    let daily = ledger.snapshot(Cadence::Daily, &format!("{}-0", tid())).unwrap();
    assert_eq!(daily.event_count, 0);
    assert_eq!(daily.lz_bridged_out_count, 1);
    assert_eq!(daily.lz_bridged_in_count, 1);
}

#[test]
fn test_balance_snapshot_hook_keys_by_day() {
    let mut ledger = MemoryLedger::default();
    replay(
        &mut ledger,
        &[
            event(TOKEN, 1, 86_400 * 2 + 5, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
            event(TOKEN, 2, 86_400 * 2 + 50, 0, transfer(ALICE, BOB, 30)),
        ],
    );

    let id = format!("{}-{}-2", address_hex(&ALICE), tid());
    let snapshot = ledger.balance_snapshot(&id).unwrap();
    assert_eq!(snapshot.amount, amount(70));
    assert_eq!(snapshot.block_number, 2);
}

#[test]
fn test_burn_beyond_tracked_supply_is_rolled_back() {
    let mut ledger = MemoryLedger::default();
    let block = BlockRef {
        number: 1,
        timestamp: 10,
    };
    ledger.increase(ALICE, &tid(), amount(50), &block).unwrap();

    let accountant = accountant();
    let reads = PrefetchedChainReads::default();
    let err = accountant
        .apply_event(
            &mut ledger,
            &reads,
            &SupplyUnavailable,
            &event(TOKEN, 2, 20, 0, transfer(ALICE, DEAD_ADDRESS, 50)),
        )
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AccountingError>(),
        Some(AccountingError::SupplyUnderflow { .. })
    ));
    assert!(ledger.token(&tid()).is_none());
    assert_eq!(ledger.balance(ALICE, &tid()), amount(50));
}

#[test]
fn test_sqlite_backend_matches_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounting.db");
    let mut db = Database::new(&format!("sqlite:{}", path.display())).unwrap();

    let accountant = accountant();
    let reads = PrefetchedChainReads::default();
    let events = [
        event(TOKEN, 1, 1_000, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
        event(TOKEN, 2, 1_012, 0, transfer(ALICE, BOB, 40)),
        event(TOKEN, 3, 1_024, 0, transfer(ALICE, DEAD_ADDRESS, 60)),
    ];
    for e in &events {
        accountant.apply_event(&mut db, &reads, &SupplyUnavailable, e).unwrap();
    }
    drop(db);

    let db = Database::new(path.to_str().unwrap()).unwrap();
    let token = TokenRepository::new(&db.conn).load(&tid()).unwrap().unwrap();
    assert_eq!(token.total_supply, amount(40));
    assert_eq!(token.current_holder_count, 1);
    assert_eq!(token.cumulative_holder_count, 2);

    let balances = BalanceRepository::new(&db.conn);
    assert_eq!(balances.get_or_create(&ALICE, &tid()).unwrap().amount, U256::ZERO);
    assert_eq!(balances.get_or_create(&BOB, &tid()).unwrap().amount, amount(40));

    let transfers = TransferRepository::new(&db.conn).transfers_for_token(&tid()).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].id, format!("{}-{}-0", tid(), hash_hex(&events[1].log.tx_hash)));

    let daily = SnapshotRepository::new(&db.conn)
        .list_for_token(Cadence::Daily, &tid())
        .unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].event_count, 3);
}

#[test]
fn test_sqlite_failure_leaves_no_partial_writes() {
    let mut db = Database::in_memory().unwrap();
    let accountant = accountant();
    let reads = PrefetchedChainReads::default();

    accountant
        .apply_event(
            &mut db,
            &reads,
            &SupplyUnavailable,
            &event(TOKEN, 1, 10, 0, transfer(GENESIS_ADDRESS, ALICE, 100)),
        )
        .unwrap();

    db.conn.execute("DROP TABLE token_hourly_snapshots", []).unwrap();

    let result = accountant.apply_event(
        &mut db,
        &reads,
        &SupplyUnavailable,
        &event(TOKEN, 2, 20, 0, transfer(GENESIS_ADDRESS, BOB, 50)),
    );
    assert!(result.is_err());

    let token = TokenRepository::new(&db.conn).load(&tid()).unwrap().unwrap();
    assert_eq!(token.total_supply, amount(100));
    assert_eq!(token.mint_count, 1);
    assert!(!BalanceRepository::new(&db.conn).exists(&BOB, &tid()).unwrap());
}
