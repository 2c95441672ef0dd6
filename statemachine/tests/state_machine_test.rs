// Integration tests for the state machine module

use looper::{now_millis, HandlerThread, Looper, Message};
use statemachine::{Context, Error, Messenger, State, StateMachine};

use std::{
    sync::{mpsc, Arc},
    time::Duration,
};

const TIMEOUT: Duration = Duration::from_secs(5);

// Defines the commands understood by the test states.
const MOVE_TO_STATE1: i32 = 0;
const MOVE_TO_STATE2: i32 = 1;
const DATA: i32 = 2;
const PING: i32 = 3;

// Defines what the test states report.
#[derive(Debug, Clone, PartialEq)]
enum Report {
    Enter(&'static str),
    Exit(&'static str),
    Handle(&'static str, i32),
    Thread(Option<String>),
}

type Reports = mpsc::Sender<Report>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn started(name: &str) -> (HandlerThread, Arc<Looper>) {
    init_tracing();
    let thread = HandlerThread::new(name);
    thread.start().unwrap();
    let looper = thread.get_looper().unwrap();
    (thread, looper)
}

fn stop(thread: HandlerThread) {
    assert!(thread.quit());
    thread.join().unwrap();
}

// A flat state moving to `other` on `trigger`, and optionally deferring DATA.
struct Simple {
    name: &'static str,
    other: &'static str,
    trigger: i32,
    defers: bool,
    reports: Reports,
}

impl State for Simple {
    fn enter(&mut self, _ctx: &mut Context<'_>) {
        let _ = self.reports.send(Report::Enter(self.name));
        let name = std::thread::current().name().map(str::to_owned);
        let _ = self.reports.send(Report::Thread(name));
    }

    fn exit(&mut self, _ctx: &mut Context<'_>) {
        let _ = self.reports.send(Report::Exit(self.name));
    }

    fn process_message(&mut self, msg: &Message, ctx: &mut Context<'_>) -> bool {
        if msg.what() == self.trigger {
            ctx.transition_to(self.other).unwrap();
        }
        if self.defers && msg.what() == DATA {
            ctx.defer_message(msg);
            return true;
        }
        let value = msg.payload::<i32>().copied().unwrap_or(msg.what());
        self.reports.send(Report::Handle(self.name, value)).is_ok()
    }
}

fn simple_machine(looper: &Arc<Looper>, reports: &Reports, defers: bool) -> StateMachine {
    let machine = StateMachine::with_name(looper, "simple");
    machine
        .add_state(
            "state1",
            Simple {
                name: "state1",
                other: "state2",
                trigger: MOVE_TO_STATE2,
                defers,
                reports: reports.clone(),
            },
        )
        .unwrap();
    machine
        .add_state(
            "state2",
            Simple {
                name: "state2",
                other: "state1",
                trigger: MOVE_TO_STATE1,
                defers: false,
                reports: reports.clone(),
            },
        )
        .unwrap();
    machine.set_initial_state("state1").unwrap();
    machine
}

fn next(receiver: &mpsc::Receiver<Report>) -> Report {
    receiver.recv_timeout(TIMEOUT).unwrap()
}

#[test]
fn test_state_machine() {
    let (thread, looper) = started("simple-machine");
    let (reports, receiver) = mpsc::channel();
    let machine = simple_machine(&looper, &reports, false);

    // We should enter the first state, on the looper thread.
    machine.start().unwrap();
    assert_eq!(next(&receiver), Report::Enter("state1"));
    assert_eq!(next(&receiver), Report::Thread(Some("simple-machine".to_owned())));

    // Messages are handled in state 1.
    machine.send_message_with(PING).unwrap();
    assert_eq!(next(&receiver), Report::Handle("state1", PING));

    // Transition to state 2.
    machine.send_message_with(MOVE_TO_STATE2).unwrap();
    assert_eq!(next(&receiver), Report::Handle("state1", MOVE_TO_STATE2));
    assert_eq!(next(&receiver), Report::Exit("state1"));
    assert_eq!(next(&receiver), Report::Enter("state2"));
    assert!(matches!(next(&receiver), Report::Thread(_)));

    // Messages are handled in state 2.
    machine.send_message_with(PING).unwrap();
    assert_eq!(next(&receiver), Report::Handle("state2", PING));

    // Transition back to state 1.
    machine.send_message_with(MOVE_TO_STATE1).unwrap();
    assert_eq!(next(&receiver), Report::Handle("state2", MOVE_TO_STATE1));
    assert_eq!(next(&receiver), Report::Exit("state2"));
    assert_eq!(next(&receiver), Report::Enter("state1"));

    stop(thread);
    assert_eq!(machine.current_state().as_deref(), Some("state1"));
}

#[test]
fn test_various_send_messages() {
    let (thread, looper) = started("various");
    let (reports, receiver) = mpsc::channel();
    let machine = simple_machine(&looper, &reports, false);

    machine.start().unwrap();
    assert_eq!(next(&receiver), Report::Enter("state1"));
    assert!(matches!(next(&receiver), Report::Thread(_)));

    let msg = |value: i32| machine.obtain_message_with(PING).with_payload(value);
    machine.send_message(msg(10)).unwrap();
    machine.send_message_at_front_of_queue(msg(11)).unwrap();
    machine.send_message_delayed(msg(12), 100).unwrap();
    machine
        .send_message_at_time(msg(13), now_millis() + 300)
        .unwrap();

    let mut handled: Vec<i32> = (0..4)
        .map(|_| match next(&receiver) {
            Report::Handle("state1", value) => value,
            other => panic!("unexpected report {:?}", other),
        })
        .collect();
    assert_eq!(&handled[2..], &[12, 13]);
    handled.truncate(2);
    handled.sort();
    assert_eq!(handled, vec![10, 11]);

    stop(thread);
}

#[test]
fn test_failing_send_messages() {
    let (thread, looper) = started("failing");
    let (reports, receiver) = mpsc::channel();
    let machine = simple_machine(&looper, &reports, false);

    machine.start().unwrap();
    assert_eq!(next(&receiver), Report::Enter("state1"));

    assert_eq!(
        machine.send_message_delayed(machine.obtain_message(), -1),
        Err(looper::Error::NegativeTime(-1))
    );
    assert_eq!(
        machine.send_message_at_time(machine.obtain_message(), -1),
        Err(looper::Error::NegativeTime(-1))
    );
    assert_eq!(
        machine.send_message(Message::obtain()),
        Err(looper::Error::MissingTarget)
    );

    stop(thread);
    assert_eq!(
        machine.send_message_with(PING),
        Ok(false),
        "a quitting looper refuses messages without failing"
    );
}

#[test]
fn test_deferring_state_machine() {
    let (thread, looper) = started("deferring");
    let (reports, receiver) = mpsc::channel();
    let machine = simple_machine(&looper, &reports, true);

    machine.start().unwrap();
    assert_eq!(next(&receiver), Report::Enter("state1"));
    assert!(matches!(next(&receiver), Report::Thread(_)));

    let data = |value: i32| machine.obtain_message_with(DATA).with_payload(value);
    machine.send_message(data(1)).unwrap();
    machine.send_message(data(2)).unwrap();
    machine.send_message_with(PING).unwrap();
    machine.send_message_with(MOVE_TO_STATE2).unwrap();
    machine.send_message(data(3)).unwrap();

    assert_eq!(next(&receiver), Report::Handle("state1", PING));
    assert_eq!(next(&receiver), Report::Handle("state1", MOVE_TO_STATE2));
    assert_eq!(next(&receiver), Report::Exit("state1"));
    assert_eq!(next(&receiver), Report::Enter("state2"));
    assert!(matches!(next(&receiver), Report::Thread(_)));

    // Deferred messages come back first, in the order they were deferred.
    assert_eq!(next(&receiver), Report::Handle("state2", 1));
    assert_eq!(next(&receiver), Report::Handle("state2", 2));
    assert_eq!(next(&receiver), Report::Handle("state2", 3));

    stop(thread);
}

#[test]
fn test_machine_outliving_its_looper() {
    let (reports, _receiver) = mpsc::channel();
    let machine = {
        let (thread, looper) = started("outlived");
        let machine = simple_machine(&looper, &reports, false);
        stop(thread);
        machine
    };

    // Every send method reports the same looper error.
    assert_eq!(machine.send_message_with(PING), Err(looper::Error::NoQueue));
    assert_eq!(
        machine.send_message(machine.obtain_message_with(PING)),
        Err(looper::Error::NoQueue)
    );
    assert_eq!(
        machine.start(),
        Err(Error::Looper(looper::Error::NoQueue))
    );
}

// A state of the hierarchy, moving to the state named in the payload.
struct Node {
    name: &'static str,
    handled: bool,
    reports: Reports,
}

impl State for Node {
    fn enter(&mut self, _ctx: &mut Context<'_>) {
        let _ = self.reports.send(Report::Enter(self.name));
    }

    fn exit(&mut self, _ctx: &mut Context<'_>) {
        let _ = self.reports.send(Report::Exit(self.name));
    }

    fn process_message(&mut self, msg: &Message, ctx: &mut Context<'_>) -> bool {
        if let Some(target) = msg.payload::<&'static str>() {
            ctx.transition_to(target).unwrap();
            return true;
        }
        let _ = self.reports.send(Report::Handle(self.name, msg.what()));
        self.handled
    }
}

#[test]
fn test_hierarchical_state_machine() {
    let (thread, looper) = started("hierarchical");
    let (reports, receiver) = mpsc::channel();
    let node = |name: &'static str, handled: bool| Node {
        name,
        handled,
        reports: reports.clone(),
    };

    let machine = StateMachine::new(&looper);
    machine.add_state("A", node("A", true)).unwrap();
    machine.add_child_state("A1", node("A1", true), "A").unwrap();
    machine.add_child_state("A2", node("A2", true), "A").unwrap();
    machine.add_state("B", node("B", true)).unwrap();
    machine.add_child_state("B1", node("B1", false), "B").unwrap();
    machine.set_initial_state("A1").unwrap();
    assert_eq!(
        machine.add_child_state("A1", node("A1", true), "B"),
        Err(Error::StateExists("A1".to_owned()))
    );

    let move_to = |target: &'static str| {
        machine
            .send_message(machine.obtain_message().with_payload(target))
            .unwrap();
    };

    machine.start().unwrap();
    assert_eq!(next(&receiver), Report::Enter("A"));
    assert_eq!(next(&receiver), Report::Enter("A1"));

    machine.send_message_with(PING).unwrap();
    assert_eq!(next(&receiver), Report::Handle("A1", PING));

    move_to("A2");
    assert_eq!(next(&receiver), Report::Exit("A1"));
    assert_eq!(next(&receiver), Report::Enter("A2"));

    machine.send_message_with(PING).unwrap();
    assert_eq!(next(&receiver), Report::Handle("A2", PING));

    move_to("B1");
    assert_eq!(next(&receiver), Report::Exit("A2"));
    assert_eq!(next(&receiver), Report::Exit("A"));
    assert_eq!(next(&receiver), Report::Enter("B"));
    assert_eq!(next(&receiver), Report::Enter("B1"));

    // B1 declines, B handles.
    machine.send_message_with(PING).unwrap();
    assert_eq!(next(&receiver), Report::Handle("B1", PING));
    assert_eq!(next(&receiver), Report::Handle("B", PING));

    stop(thread);
    assert!(receiver.try_recv().is_err());
}
