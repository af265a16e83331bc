use std::time::Duration;

use courier::*;
use mul_model::{ArithAddArgs, ArithAddReply};
use test_suite::*;

const ARGS: ArithAddArgs = ArithAddArgs { a: 3, b: 5 };

#[tokio::test]
async fn retries_are_bounded_and_last_error_wins() {
    let provider = MemoryProvider::new(SerializeType::Json);
    provider.plan(Plan::Hang);
    let (pool, _) = arith_pool(3);

    for retries in 0..4u32 {
        let before = provider.sends();
        let proxy = arith_builder(&provider, &pool)
            .timeout(Duration::from_millis(20))
            .fail_mode(FailMode::Failover)
            .retries(retries)
            .build()
            .await
            .unwrap();
        let err = proxy
            .invoke::<_, ArithAddReply>("Mul", ARGS)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Timeout, err.kind());
        assert_eq!(retries as usize + 1, provider.sends() - before);
    }
}

#[tokio::test]
async fn remote_error_is_attempted_once() {
    let provider = MemoryProvider::new(SerializeType::Json);
    provider.plan(Plan::Remote("divide by zero".to_owned()));
    let (pool, _) = arith_pool(3);
    let proxy = arith_builder(&provider, &pool)
        .fail_mode(FailMode::Failover)
        .retries(5)
        .build()
        .await
        .unwrap();

    let err = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::RemoteError, err.kind());
    assert_eq!("divide by zero", err.detail());
    assert_eq!(1, provider.sends());
}

#[tokio::test]
async fn failover_lands_on_a_healthy_provider() {
    let provider = MemoryProvider::new(SerializeType::Json);
    let (pool, channels) = arith_pool(3);
    provider.plan_for(&channels[0], Plan::Lost);
    provider.plan_for(&channels[1], Plan::Hang);
    let proxy = arith_builder(&provider, &pool)
        .timeout(Duration::from_millis(30))
        .select_mode(SelectMode::RandomSelect)
        .fail_mode(FailMode::Failover)
        .retries(2)
        .build()
        .await
        .unwrap();

    let reply = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap()
        .value()
        .await
        .unwrap();
    assert_eq!(15, reply.c);

    let sent_to = provider.sent_to();
    assert_eq!(Some(&channels[2].id()), sent_to.last());
    let mut unique = sent_to.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(sent_to.len(), unique.len());
}

#[tokio::test]
async fn failtry_keeps_the_same_provider() {
    let provider = MemoryProvider::new(SerializeType::Json);
    provider.plan(Plan::Lost);
    let (pool, channels) = arith_pool(3);
    let proxy = arith_builder(&provider, &pool)
        .fail_mode(FailMode::Failtry)
        .retries(2)
        .build()
        .await
        .unwrap();

    let err = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::ConnectionLost, err.kind());
    assert_eq!(vec![channels[0].id(); 3], provider.sent_to());
}

#[tokio::test]
async fn async_and_multicast_calls_are_not_retried() {
    let provider = MemoryProvider::new(SerializeType::Json);
    provider.plan(Plan::Lost);
    let (pool, _) = arith_pool(2);

    let proxy = arith_builder(&provider, &pool)
        .invoke_type(InvokeType::Async)
        .fail_mode(FailMode::Failover)
        .retries(3)
        .build()
        .await
        .unwrap();
    let err = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap()
        .value()
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::ConnectionLost, err.kind());
    assert_eq!(1, provider.sends());

    let proxy = arith_builder(&provider, &pool)
        .dispatch_type(DispatchType::Multicast)
        .fail_mode(FailMode::Failover)
        .retries(3)
        .build()
        .await
        .unwrap();
    let outcomes = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap()
        .outcomes()
        .await
        .unwrap();
    assert!(outcomes.iter().all(|o| o.result.is_err()));
    assert_eq!(3, provider.sends());
}

#[tokio::test]
async fn no_provider_fails_without_retrying() {
    let provider = MemoryProvider::new(SerializeType::Json);
    let (pool, channels) = arith_pool(2);
    for channel in &channels {
        pool.set_available(channel, false);
    }
    let proxy = arith_builder(&provider, &pool)
        .fail_mode(FailMode::Failover)
        .retries(3)
        .build()
        .await
        .unwrap();

    let err = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::NoAvailableChannel, err.kind());
    assert_eq!(0, provider.sends());
}

#[tokio::test]
async fn overall_deadline_bounds_the_whole_call() {
    let provider = MemoryProvider::new(SerializeType::Json);
    provider.plan(Plan::Hang);
    let (pool, _) = arith_pool(2);
    let proxy = arith_builder(&provider, &pool)
        .timeout(Duration::from_millis(100))
        .fail_mode(FailMode::Failover)
        .retries(10)
        .overall_deadline(Some(Duration::from_millis(250)))
        .build()
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let err = proxy
        .invoke::<_, ArithAddReply>("Mul", ARGS)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Timeout, err.kind());
    assert_eq!(3, provider.sends());
    assert!(started.elapsed() < Duration::from_millis(1000));
}
