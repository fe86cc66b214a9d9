use super::*;
use crate::command::rdp::RdpCmd;
use crate::hardware::{SimConfig, SimQueue};

const COST: u64 = 16;

fn dispatcher() -> Dispatcher<SimQueue> {
    Dispatcher::new(SimQueue::new(SimConfig::default()).unwrap(), DispatchConfig::default()).unwrap()
}

fn hung_dispatcher(config: DispatchConfig) -> Dispatcher<SimQueue> {
    let queue = SimQueue::new(SimConfig::default().with_hang_after(1)).unwrap();
    Dispatcher::new(queue, config).unwrap()
}

fn waiting_policy() -> DispatchConfig {
    DispatchConfig::default()
        .with_completion_policy(CompletionPolicy::WaitForCompletion { timeout_ticks: 500 })
}

fn buffer(words: &[u64]) -> CommandBuffer {
    let mut buf = CommandBuffer::new(words.len().max(1)).unwrap();
    for &w in words {
        buf.append_word(w);
    }
    buf
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_invalid_config_rejected() {
    let queue = SimQueue::new(SimConfig::default()).unwrap();
    let config = DispatchConfig { probe_delay_us: 0, ..Default::default() };
    assert!(matches!(Dispatcher::new(queue, config), Err(Error::InvalidConfig(_))));
}

// ============================================================================
// SYNC
// ============================================================================

#[test]
fn test_sync_completes_and_executes_in_order() {
    let mut d = dispatcher();
    let mut buf = buffer(&[
        RdpCmd::SYNC_PIPE.as_raw(),
        RdpCmd::fill_rect(0, 0, 8, 8).as_raw(),
        RdpCmd::SYNC_FULL.as_raw(),
    ]);

    let outcome = d.submit_sync(&mut buf, Timeout::Infinite).unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.ticket().mode, SubmitMode::Sync);
    assert_eq!(outcome.ticket().word_count, 3);
    assert!(outcome.elapsed_ticks() >= 3 * COST);
    assert_eq!(buf.state(), BufferState::Completed);
    assert_eq!(d.queue().executed(), buf.words());
    assert_eq!(d.stats().sync_submissions, 1);
}

#[test]
fn test_sequential_syncs_never_interleave() {
    let mut d = dispatcher();
    let mut a = buffer(&[1, 2, 3]);
    let mut b = buffer(&[4, 5]);
    d.submit_sync(&mut a, Timeout::Infinite).unwrap();
    d.submit_sync(&mut b, Timeout::Infinite).unwrap();
    assert_eq!(d.queue().executed(), &[1, 2, 3, 4, 5]);
    assert_eq!(b.ticket().map(|t| t.sequence), Some(2));
}

#[test]
fn test_sync_timeout_is_bounded_on_hung_queue() {
    let mut d = hung_dispatcher(DispatchConfig::default());
    let mut buf = buffer(&[1, 2, 3]);

    let outcome = d.submit_sync(&mut buf, Timeout::Ticks(1_000)).unwrap();
    match outcome {
        SyncOutcome::TimedOut { ticket, registers, elapsed_ticks } => {
            assert!(elapsed_ticks >= 1_000);
            assert!(elapsed_ticks < 1_010);
            assert_eq!(registers.current, ticket.span.start + 8);
            assert_eq!(registers.end, ticket.span.end);
            assert!(registers.status.contains(QueueStatus::PIPE_BUSY));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(buf.state(), BufferState::TimedOut);
    assert_eq!(d.stats().timeouts, 1);
    // No register reset on timeout
    assert!(d.queue().is_hung());
}

#[test]
fn test_timed_out_buffer_can_be_reset() {
    let mut d = hung_dispatcher(DispatchConfig::default());
    let mut buf = buffer(&[1, 2]);
    d.submit_sync(&mut buf, Timeout::Ticks(100)).unwrap();
    assert_eq!(buf.state(), BufferState::TimedOut);
    buf.reset();
    assert_eq!(buf.state(), BufferState::Built);
}

#[test]
fn test_sync_default_uses_configured_timeout() {
    let config = DispatchConfig::default().with_sync_timeout(Timeout::Ticks(200));
    let mut d = hung_dispatcher(config);
    let mut buf = buffer(&[1, 2]);
    let outcome = d.submit_sync_default(&mut buf).unwrap();
    assert!(!outcome.is_completed());
    assert!(outcome.elapsed_ticks() < 210);
}

#[test]
fn test_empty_buffer_completes_without_kick() {
    let mut d = dispatcher();
    let mut buf = CommandBuffer::new(4).unwrap();
    let outcome = d.submit_sync(&mut buf, Timeout::Ticks(10)).unwrap();
    assert_eq!(outcome.elapsed_ticks(), 0);
    assert!(!outcome.ticket().was_kicked());
    assert_eq!(buf.state(), BufferState::Completed);
    assert_eq!(d.queue().kick_count(), 0);
    assert_eq!(d.stats().empty_submissions, 1);

    let ticket = d.submit_async(&mut buf).unwrap();
    assert!(d.is_complete(&ticket));
    assert_eq!(buf.state(), BufferState::Completed);
}

// ============================================================================
// ASYNC / POLL
// ============================================================================

#[test]
fn test_async_returns_before_completion() {
    let mut d = dispatcher();
    let mut buf = buffer(&[1, 2, 3, 4]);
    let ticket = d.submit_async(&mut buf).unwrap();

    assert_eq!(ticket.mode, SubmitMode::Async);
    assert_eq!(buf.state(), BufferState::Submitted);
    assert_eq!(d.queue().in_flight(), 1);
    assert!(!d.is_complete(&ticket));

    d.wait_ticks(4 * COST);
    assert!(d.is_complete(&ticket));
    assert_eq!(d.poll(&mut buf), BufferState::Completed);
}

#[test]
fn test_earlier_ticket_complete_once_fetch_moves_on() {
    let mut d = dispatcher();
    let mut a = buffer(&[1, 2]);
    let mut b = buffer(&[3, 4, 5, 6]);
    let ta = d.submit_async(&mut a).unwrap();
    let tb = d.submit_async(&mut b).unwrap();

    d.wait_ticks(3 * COST);
    assert!(d.is_complete(&ta));
    assert!(!d.is_complete(&tb));
    assert_eq!(d.poll(&mut a), BufferState::Completed);
    assert_eq!(d.poll(&mut b), BufferState::Submitted);
}

#[test]
fn test_earlier_ticket_complete_while_later_span_runs() {
    let mut d = dispatcher();
    let mut a = buffer(&[1, 2]);
    let mut b = buffer(&[0; 200]);
    let mut c = buffer(&[3]);
    let ta = d.submit_async(&mut a).unwrap();
    let tb = d.submit_async(&mut b).unwrap();
    let tc = d.submit_async(&mut c).unwrap();

    d.wait_ticks(10 * COST);
    assert!(tb.span.contains(d.diagnostics().current));
    assert!(d.is_complete(&ta));
    assert!(!d.is_complete(&tb));
    assert!(!d.is_complete(&tc));
    assert_eq!(d.poll(&mut a), BufferState::Completed);
    assert_eq!(d.poll(&mut b), BufferState::Submitted);

    d.wait_ticks(200 * COST);
    assert!(d.is_complete(&tb));
    assert!(d.is_complete(&tc));
}

#[test]
fn test_wait_policy_blames_the_stalled_middle_submission() {
    let queue = SimQueue::new(SimConfig::default().with_hang_after(5)).unwrap();
    let mut d = Dispatcher::new(queue, waiting_policy()).unwrap();
    let mut a = buffer(&[1, 2]);
    let mut b = buffer(&[0; 8]);
    let mut c = buffer(&[3]);
    d.submit_probe(&mut a);
    d.submit_probe(&mut b);
    d.submit_probe(&mut c);

    assert_eq!(d.retire(&mut a).unwrap(), BufferState::Completed);
    assert!(matches!(
        d.retire(&mut b),
        Err(Error::PriorSubmissionStalled { sequence: 2, .. })
    ));
}

#[test]
#[should_panic(expected = "still in flight")]
fn test_resubmitting_inflight_buffer_panics() {
    let mut d = dispatcher();
    let mut buf = buffer(&[1, 2]);
    d.submit_async(&mut buf).unwrap();
    let _ = d.submit_async(&mut buf);
}

#[test]
fn test_sequences_are_monotonic() {
    let mut d = dispatcher();
    let mut buf = buffer(&[1]);
    let mut seqs = Vec::new();
    for _ in 0..3 {
        let t = d.submit_async(&mut buf).unwrap();
        seqs.push(t.sequence);
        d.retire(&mut buf).unwrap();
    }
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(d.latest().map(|t| t.sequence), Some(3));
}

// ============================================================================
// COMPLETION POLICY
// ============================================================================

#[test]
fn test_assume_policy_retires_without_polling() {
    let mut d = hung_dispatcher(DispatchConfig::default());
    let mut buf = buffer(&[1, 2]);
    d.submit_async(&mut buf).unwrap();

    let read_cost = d.queue().config().ticks_per_read;
    let before = d.ticks();
    assert_eq!(d.retire(&mut buf).unwrap(), BufferState::Completed);
    assert_eq!(d.ticks() - before, read_cost);
    assert!(d.queue().executed().is_empty());

    // The queue is wedged behind the first word all the same
    d.wait_ticks(COST * 2);
    assert!(d.queue().is_hung());
    assert_eq!(d.queue().executed(), &[1]);
}

#[test]
fn test_assume_policy_submits_over_unfinished_work() {
    let mut d = hung_dispatcher(DispatchConfig::default());
    let mut a = buffer(&[1, 2]);
    let mut b = buffer(&[3]);
    d.submit_async(&mut a).unwrap();
    d.submit_async(&mut b).unwrap();
    assert_eq!(d.queue().kick_count(), 2);
}

#[test]
fn test_wait_policy_retires_after_completion() {
    let queue = SimQueue::new(SimConfig::default()).unwrap();
    let mut d = Dispatcher::new(queue, waiting_policy()).unwrap();
    let mut buf = buffer(&[1, 2, 3]);
    d.submit_async(&mut buf).unwrap();
    assert_eq!(d.retire(&mut buf).unwrap(), BufferState::Completed);
    assert_eq!(d.queue().executed(), &[1, 2, 3]);
}

#[test]
fn test_wait_policy_reports_stalled_retire() {
    let mut d = hung_dispatcher(waiting_policy());
    let mut buf = buffer(&[1, 2]);
    d.submit_async(&mut buf).unwrap();

    match d.retire(&mut buf) {
        Err(Error::PriorSubmissionStalled { sequence, waited_ticks }) => {
            assert_eq!(sequence, 1);
            assert!(waited_ticks >= 500);
        }
        other => panic!("expected stall, got {:?}", other),
    }
    assert_eq!(buf.state(), BufferState::Submitted);
    assert_eq!(d.stats().stalls, 1);
}

#[test]
fn test_wait_policy_refuses_new_work_behind_stall() {
    let mut d = hung_dispatcher(waiting_policy());
    let mut a = buffer(&[1, 2]);
    let mut b = buffer(&[3]);
    d.submit_async(&mut a).unwrap();

    assert!(matches!(
        d.submit_async(&mut b),
        Err(Error::PriorSubmissionStalled { sequence: 1, .. })
    ));
    assert!(matches!(
        d.submit_sync(&mut b, Timeout::Infinite),
        Err(Error::PriorSubmissionStalled { .. })
    ));
    assert_eq!(d.queue().kick_count(), 1);
    assert_eq!(b.state(), BufferState::Built);
}

#[test]
fn test_probe_is_never_refused() {
    let mut d = hung_dispatcher(waiting_policy());
    let mut a = buffer(&[1, 2]);
    d.submit_async(&mut a).unwrap();

    let mut probe = buffer(&[RdpCmd::SYNC_PIPE.as_raw(), RdpCmd::SYNC_FULL.as_raw()]);
    let ticket = d.submit_probe(&mut probe);
    assert_eq!(ticket.mode, SubmitMode::Probe);
    assert_eq!(d.queue().kick_count(), 2);
    assert_eq!(d.stats().probe_submissions, 1);
}

#[test]
fn test_retire_leaves_other_states_alone() {
    let mut d = dispatcher();
    let mut buf = buffer(&[1]);
    assert_eq!(d.retire(&mut buf).unwrap(), BufferState::Built);
    d.submit_sync(&mut buf, Timeout::Infinite).unwrap();
    assert_eq!(d.retire(&mut buf).unwrap(), BufferState::Completed);
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[test]
fn test_diagnostics_reads_raw_registers() {
    let mut d = dispatcher();
    let forced = DiagnosticRegisters {
        clock: 0x11,
        busy: 0x22,
        current: 0x0010_0008,
        end: 0x0010_0010,
        status: QueueStatus::PIPE_BUSY,
    };
    d.queue_mut().force_hang(forced);
    assert_eq!(d.diagnostics(), forced);
}

#[test]
fn test_wait_passthrough_advances_clock() {
    let mut d = dispatcher();
    let before = d.ticks();
    d.wait_us(250);
    assert!(d.ticks() - before >= 11_718);
    let queue = d.into_inner();
    assert_eq!(queue.kick_count(), 0);
}
