//! Tests for batch building and lifecycle
//!
//! Covers nonce allocation, fee aggregation, timeout projection, the
//! profitability guard and cascading cancellation on execution.

#[cfg(test)]
mod tests {
    use crate::{
        batch::{BatchKeeper, FeeEvaluator, NonceAllocator, TimeoutProjector},
        config::{BridgeConfig, Params},
        context::Context,
        error::BatchError,
        events::{EventType, ATTRIBUTE_KEY_BRIDGE_CHAIN_ID, ATTRIBUTE_KEY_CONTRACT, ATTRIBUTE_KEY_NONCE},
        pool::UnbatchedPool,
        store::{keys, record, run_transition, KvStore, MemStore},
        types::{Erc20Token, ObservedHeights, SendToForeign, StoredRecord},
    };
    use ethers::types::{Address, U256};
    use std::collections::HashMap;

    fn token(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn bridge() -> BridgeConfig {
        BridgeConfig {
            contract_address: Address::repeat_byte(0xbb),
            chain_id: 5,
        }
    }

    fn keeper() -> BatchKeeper {
        BatchKeeper::new(Params::default(), bridge())
    }

    fn ctx_at(height: u64) -> Context<MemStore> {
        Context::new(MemStore::new(), height)
    }

    /// Same store, new height, no events
    fn advance(ctx: Context<MemStore>, height: u64) -> Context<MemStore> {
        let (store, _) = ctx.into_parts();
        Context::new(store, height)
    }

    fn add_transfer<S: KvStore>(ctx: &mut Context<S>, token: Address, fee: u64) -> SendToForeign {
        UnbatchedPool::add_transfer(
            ctx,
            "home1sender".to_string(),
            Address::repeat_byte(0xee),
            Erc20Token::new(token, 1_000u64),
            Erc20Token::new(token, fee),
        )
        .unwrap()
    }

    fn pool_fees(ctx: &Context<MemStore>, token: Address) -> Vec<u64> {
        UnbatchedPool::transfers(ctx.store(), token)
            .unwrap()
            .iter()
            .map(|tx| tx.fee.amount.as_u64())
            .collect()
    }

    #[test]
    fn test_nonces_start_at_one_and_increase() {
        let mut store = MemStore::new();
        assert_eq!(NonceAllocator::last_nonce(&store).unwrap(), 0);

        let nonces: Vec<u64> = (0..5)
            .map(|_| NonceAllocator::allocate_next(&mut store).unwrap())
            .collect();

        assert_eq!(nonces, vec![1, 2, 3, 4, 5]);
        assert_eq!(NonceAllocator::last_nonce(&store).unwrap(), 5);
        assert_eq!(
            store.get(&[keys::LAST_OUTGOING_BATCH_NONCE_KEY]),
            Some(5u64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn test_nonces_are_global_across_tokens() {
        let keeper = keeper();
        let mut ctx = ctx_at(10);
        add_transfer(&mut ctx, token(1), 5);
        add_transfer(&mut ctx, token(2), 5);

        let a = keeper.build_batch(&mut ctx, token(1), 10).unwrap().unwrap();
        let b = keeper.build_batch(&mut ctx, token(2), 10).unwrap().unwrap();
        let c = keeper.build_batch(&mut ctx, token(1), 10).unwrap();

        assert_eq!(a.nonce, 1);
        assert_eq!(b.nonce, 2);
        // Pool for token 1 is empty, the outstanding batch pays more.
        assert!(c.is_none());
    }

    #[test]
    fn test_aggregate_fees_uses_highest_fees_first() {
        let mut ctx = ctx_at(1);
        for fee in [3, 10, 7] {
            add_transfer(&mut ctx, token(1), fee);
        }
        add_transfer(&mut ctx, token(2), 100);

        let store = ctx.store();
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(1), 2).unwrap(), U256::from(17));
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(1), 1).unwrap(), U256::from(10));
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(1), 100).unwrap(), U256::from(20));
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(1), 0).unwrap(), U256::zero());
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(3), 5).unwrap(), U256::zero());

        // Read-only: asking again gives the same answer and the pool is intact.
        assert_eq!(FeeEvaluator::aggregate_fees(store, token(1), 2).unwrap(), U256::from(17));
        assert_eq!(pool_fees(&ctx, token(1)), vec![10, 7, 3]);
    }

    #[test]
    fn test_all_batch_fees_lists_tokens_in_address_order() {
        let mut ctx = ctx_at(1);
        add_transfer(&mut ctx, token(9), 4);
        add_transfer(&mut ctx, token(2), 6);
        add_transfer(&mut ctx, token(2), 1);

        let fees = FeeEvaluator::all_batch_fees(ctx.store(), 100).unwrap();
        assert_eq!(fees, vec![(token(2), U256::from(7)), (token(9), U256::from(4))]);
    }

    #[test]
    fn test_timeout_projection_example() {
        let projector = TimeoutProjector::new(&Params::default());
        let heights = ObservedHeights {
            home_height: 100,
            foreign_height: 1000,
        };

        // elapsed 60 blocks * 5s = 300s = 20 foreign blocks; 12h = 2880 foreign blocks
        assert_eq!(projector.project(heights, 160), 3900);
        assert_eq!(projector.project(heights, 100), 3880);
    }

    #[test]
    fn test_timeout_is_zero_until_heights_are_observed() {
        let projector = TimeoutProjector::new(&Params::default());
        let store = MemStore::new();

        assert_eq!(projector.project_timeout(&store, 160).unwrap(), 0);
        assert_eq!(projector.project(ObservedHeights::default(), 1_000_000), 0);
        assert_eq!(
            projector.project(ObservedHeights { home_height: 100, foreign_height: 0 }, 160),
            0
        );
        assert_eq!(
            projector.project(ObservedHeights { home_height: 0, foreign_height: 1000 }, 160),
            0
        );
    }

    #[test]
    fn test_timeout_reads_oracle_heights_from_store() {
        let keeper = keeper();
        let mut ctx = ctx_at(100);
        keeper.set_observed_heights(&mut ctx, 1000);

        let timeout = keeper.projector().project_timeout(ctx.store(), 160).unwrap();
        assert_eq!(timeout, 3900);
    }

    #[test]
    fn test_end_to_end_selection_and_rebuild() {
        let keeper = keeper();
        let x = token(1);
        let mut ctx = ctx_at(50);
        for fee in [10, 7, 3] {
            add_transfer(&mut ctx, x, fee);
        }

        let first = keeper.build_batch(&mut ctx, x, 2).unwrap().unwrap();
        assert_eq!(first.nonce, 1);
        assert_eq!(first.height, 50);
        assert_eq!(first.fee_total(), U256::from(17));
        let fees: Vec<u64> = first.transactions.iter().map(|tx| tx.fee.amount.as_u64()).collect();
        assert_eq!(fees, vec![10, 7]);
        assert_eq!(pool_fees(&ctx, x), vec![3]);

        // The outstanding batch pays 17, a new one would pay 3.
        assert!(keeper.build_batch(&mut ctx, x, 2).unwrap().is_none());

        keeper.lifecycle().execute_batch(&mut ctx, x, first.nonce).unwrap();
        let second = keeper.build_batch(&mut ctx, x, 2).unwrap().unwrap();
        assert_eq!(second.nonce, 2);
        assert_eq!(second.transactions.len(), 1);
        assert_eq!(second.fee_total(), U256::from(3));
        assert!(pool_fees(&ctx, x).is_empty());
    }

    #[test]
    fn test_profitability_guard_rejects_equal_fees() {
        let keeper = keeper();
        let x = token(1);
        let mut ctx = ctx_at(1);
        add_transfer(&mut ctx, x, 5);
        keeper.build_batch(&mut ctx, x, 10).unwrap().unwrap();

        add_transfer(&mut ctx, x, 5);
        assert!(keeper.build_batch(&mut ctx, x, 10).unwrap().is_none());
        assert_eq!(pool_fees(&ctx, x), vec![5]);

        add_transfer(&mut ctx, x, 1);
        let better = keeper.build_batch(&mut ctx, x, 10).unwrap().unwrap();
        assert_eq!(better.fee_total(), U256::from(6));

        let current = keeper.lifecycle().get_current_batch(ctx.store(), x).unwrap().unwrap();
        assert_eq!(current.nonce, better.nonce);
        assert_eq!(keeper.lifecycle().outstanding_batches(ctx.store()).unwrap().len(), 2);
    }

    #[test]
    fn test_build_fee_total_matches_prior_aggregate() {
        let keeper = keeper();
        let x = token(4);
        let mut ctx = ctx_at(1);
        for fee in [8, 1, 12, 12, 4, 9] {
            add_transfer(&mut ctx, x, fee);
        }

        let expected = FeeEvaluator::aggregate_fees(ctx.store(), x, 4).unwrap();
        let batch = keeper.build_batch(&mut ctx, x, 4).unwrap().unwrap();
        assert_eq!(batch.fee_total(), expected);
        assert_eq!(expected, U256::from(41));
    }

    #[test]
    fn test_empty_pool_still_creates_batch() {
        let keeper = keeper();
        let mut ctx = ctx_at(7);

        let batch = keeper.build_batch(&mut ctx, token(1), 100).unwrap().unwrap();
        assert!(batch.transactions.is_empty());
        assert_eq!(batch.timeout, 0);
        assert!(keeper.lifecycle().get_batch(ctx.store(), token(1), batch.nonce).unwrap().is_some());
    }

    #[test]
    fn test_build_emits_outgoing_batch_event() {
        let keeper = keeper();
        let mut ctx = ctx_at(1);
        add_transfer(&mut ctx, token(1), 2);
        keeper.build_batch(&mut ctx, token(1), 10).unwrap();

        let events = ctx.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::OutgoingBatch);
        assert_eq!(events[0].attribute(ATTRIBUTE_KEY_NONCE), Some("1"));
        assert_eq!(events[0].attribute(ATTRIBUTE_KEY_BRIDGE_CHAIN_ID), Some("5"));
        assert_eq!(
            events[0].attribute(ATTRIBUTE_KEY_CONTRACT),
            Some(format!("{:?}", Address::repeat_byte(0xbb)).as_str())
        );
    }

    #[test]
    fn test_execute_cancels_older_batches_of_same_token_only() {
        let keeper = keeper();
        let (a, b) = (token(1), token(2));
        let mut ctx = ctx_at(1);

        add_transfer(&mut ctx, a, 1);
        let a1 = keeper.build_batch(&mut ctx, a, 10).unwrap().unwrap();
        add_transfer(&mut ctx, b, 1);
        let b2 = keeper.build_batch(&mut ctx, b, 10).unwrap().unwrap();
        add_transfer(&mut ctx, a, 5);
        let a3 = keeper.build_batch(&mut ctx, a, 10).unwrap().unwrap();
        add_transfer(&mut ctx, a, 9);
        let a4 = keeper.build_batch(&mut ctx, a, 10).unwrap().unwrap();
        assert_eq!((a1.nonce, b2.nonce, a3.nonce, a4.nonce), (1, 2, 3, 4));

        let mut ctx = advance(ctx, 2);
        keeper.lifecycle().execute_batch(&mut ctx, a, a3.nonce).unwrap();

        let lifecycle = keeper.lifecycle();
        assert!(lifecycle.get_batch(ctx.store(), a, 1).unwrap().is_none());
        assert!(lifecycle.get_batch(ctx.store(), a, 3).unwrap().is_none());
        assert!(lifecycle.get_batch(ctx.store(), a, 4).unwrap().is_some());
        assert!(lifecycle.get_batch(ctx.store(), b, 2).unwrap().is_some());

        // Batch 1's transfer is requeued; batch 3's transfer is final.
        assert_eq!(pool_fees(&ctx, a), vec![1]);
        assert!(pool_fees(&ctx, b).is_empty());

        let canceled: Vec<_> = ctx
            .events()
            .iter()
            .filter(|e| e.kind == EventType::OutgoingBatchCanceled)
            .map(|e| e.attribute(ATTRIBUTE_KEY_NONCE).map(str::to_string))
            .collect();
        assert_eq!(canceled, vec![Some("1".to_string())]);
    }

    #[test]
    fn test_execute_unknown_batch_is_invariant_violation() {
        let keeper = keeper();
        let mut ctx = ctx_at(1);

        let err = keeper.lifecycle().execute_batch(&mut ctx, token(1), 42).unwrap_err();
        assert!(matches!(err, BatchError::BatchNotFound { nonce: 42, .. }));
        assert!(err.is_invariant_violation());

        let err = keeper.lifecycle().cancel_batch(&mut ctx, token(1), 42).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_cancel_restores_pool_exactly() {
        let keeper = keeper();
        let x = token(3);
        let mut ctx = ctx_at(1);
        for fee in [4, 4, 9, 2] {
            add_transfer(&mut ctx, x, fee);
        }
        let before = UnbatchedPool::transfers(ctx.store(), x).unwrap();

        let mut ctx = advance(ctx, 30);
        let batch = keeper.build_batch(&mut ctx, x, 3).unwrap().unwrap();
        assert_eq!(UnbatchedPool::transfers(ctx.store(), x).unwrap().len(), 1);

        let canceled = keeper.lifecycle().cancel_batch(&mut ctx, x, batch.nonce).unwrap();
        assert_eq!(canceled, batch);
        assert_eq!(UnbatchedPool::transfers(ctx.store(), x).unwrap(), before);
        assert!(keeper.lifecycle().get_current_batch(ctx.store(), x).unwrap().is_none());
        assert_eq!(ctx.events().last().map(|e| e.kind), Some(EventType::OutgoingBatchCanceled));
    }

    #[test]
    fn test_every_transfer_has_exactly_one_home() {
        let keeper = keeper();
        let x = token(1);
        let mut ctx = ctx_at(1);
        let mut ids = Vec::new();
        for fee in 1..=12u64 {
            ids.push(add_transfer(&mut ctx, x, fee * 3 % 7 + 1).id);
            if fee % 4 == 0 {
                keeper.build_batch(&mut ctx, x, 3).unwrap();
            }
        }

        let mut homes: HashMap<u64, usize> = HashMap::new();
        for tx in UnbatchedPool::transfers(ctx.store(), x).unwrap() {
            *homes.entry(tx.id).or_default() += 1;
        }
        for batch in keeper.lifecycle().outstanding_batches(ctx.store()).unwrap() {
            for tx in batch.transactions {
                *homes.entry(tx.id).or_default() += 1;
            }
        }

        assert_eq!(homes.len(), ids.len());
        assert!(ids.iter().all(|id| homes.get(id) == Some(&1)));
    }

    #[test]
    fn test_slash_candidates_between_watermark_and_max_height() {
        let keeper = keeper();
        let lifecycle = keeper.lifecycle();
        let mut ctx = ctx_at(5);
        for (i, height) in [5u64, 10, 15].into_iter().enumerate() {
            ctx = advance(ctx, height);
            let t = token(i as u8 + 1);
            add_transfer(&mut ctx, t, 1);
            keeper.build_batch(&mut ctx, t, 10).unwrap();
        }

        assert_eq!(lifecycle.get_slash_watermark(ctx.store()).unwrap(), 0);
        let all: Vec<u64> = lifecycle
            .get_slash_candidates(ctx.store(), 16)
            .unwrap()
            .iter()
            .map(|b| b.height)
            .collect();
        assert_eq!(all.len(), 3);

        lifecycle.set_slash_watermark(ctx.store_mut(), 5);
        let candidates = lifecycle.get_slash_candidates(ctx.store(), 15).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].height, 10);
        assert_eq!(lifecycle.get_slash_watermark(ctx.store()).unwrap(), 5);
    }

    #[test]
    fn test_timed_out_batches_are_canceled() {
        let keeper = keeper();
        let x = token(1);
        let mut ctx = ctx_at(100);
        keeper.set_observed_heights(&mut ctx, 1000);
        add_transfer(&mut ctx, x, 3);
        let batch = keeper.build_batch(&mut ctx, x, 10).unwrap().unwrap();
        assert_eq!(batch.timeout, 3880);

        let mut ctx = advance(ctx, 101);
        keeper.set_observed_heights(&mut ctx, 3880);
        let report = keeper.end_block(&mut ctx).unwrap();
        assert!(report.timed_out.is_empty());

        let mut ctx = advance(ctx, 102);
        keeper.set_observed_heights(&mut ctx, 3881);
        let report = keeper.end_block(&mut ctx).unwrap();
        assert_eq!(report.timed_out, vec![batch.nonce]);
        assert_eq!(pool_fees(&ctx, x), vec![3]);
    }

    #[test]
    fn test_end_block_builds_on_creation_period() {
        let keeper = keeper();
        let mut ctx = ctx_at(9);
        add_transfer(&mut ctx, token(7), 1);
        add_transfer(&mut ctx, token(3), 1);

        let report = keeper.end_block(&mut ctx).unwrap();
        assert!(report.created.is_empty());

        let mut ctx = advance(ctx, 10);
        let report = keeper.end_block(&mut ctx).unwrap();
        assert_eq!(report.created, vec![1, 2]);
        let first = keeper.lifecycle().get_batch(ctx.store(), token(3), 1).unwrap();
        assert!(first.is_some());

        // Nothing pending: no empty batches from the periodic pass.
        let mut ctx = advance(ctx, 20);
        assert!(keeper.end_block(&mut ctx).unwrap().created.is_empty());
    }

    #[test]
    fn test_end_block_with_zero_period_skips_creation() {
        let keeper = BatchKeeper::new(
            Params {
                batch_creation_period: 0,
                ..Params::default()
            },
            bridge(),
        );
        let mut ctx = ctx_at(0);
        add_transfer(&mut ctx, token(1), 3);

        for height in [0, 1, 10] {
            let mut next = advance(ctx, height);
            assert!(keeper.end_block(&mut next).unwrap().created.is_empty());
            ctx = next;
        }
        assert_eq!(pool_fees(&ctx, token(1)), vec![3]);
    }

    #[test]
    fn test_failed_transition_writes_nothing() {
        let keeper = keeper();
        let mut store = MemStore::new();
        run_transition(&mut store, 1, |ctx| {
            add_transfer(ctx, token(1), 4);
            Ok::<_, BatchError>(())
        })
        .unwrap();
        let snapshot = store.prefix_scan(&[]);

        let result = run_transition(&mut store, 2, |ctx| {
            keeper.build_batch(ctx, token(1), 10)?;
            keeper.lifecycle().execute_batch(ctx, token(1), 99)
        });

        assert!(result.is_err());
        assert_eq!(store.prefix_scan(&[]), snapshot);
        assert_eq!(NonceAllocator::last_nonce(&store).unwrap(), 0);
    }

    #[test]
    fn test_mismatched_record_at_batch_key_is_fatal() {
        let keeper = keeper();
        let mut store = MemStore::new();
        let bogus = SendToForeign {
            id: 1,
            sender: "home1sender".to_string(),
            foreign_recipient: Address::zero(),
            amount: Erc20Token::new(token(1), 1u64),
            fee: Erc20Token::new(token(1), 1u64),
            height: 1,
        };
        store.set(
            keys::batch_tx_key(token(1), 1),
            record::encode(&StoredRecord::Transfer(bogus)).unwrap(),
        );

        let err = keeper.lifecycle().get_current_batch(&store, token(1)).unwrap_err();
        assert!(matches!(err, BatchError::UnexpectedRecord { .. }));
        assert!(err.is_invariant_violation());
    }
}
