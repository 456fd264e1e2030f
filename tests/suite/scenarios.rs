//! End-to-end collection scenarios with mixed seats.

use std::time::Duration;

use arbiter_engine::input_all;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::common::{Pick, TIMEOUT, answer_after, bot, drain, human, new_game, tags};

/// Three humans answer out of order under `all`.
#[tokio::test(start_paused = true)]
async fn all_preserves_request_order_and_emits_in_arrival_order() {
    let (a, a_client) = human("a");
    let (b, b_client) = human("b");
    let (c, c_client) = human("c");
    let seats = vec![a, b, c];
    let (game, recorder) = new_game(seats.clone());

    let a_task = answer_after(a_client, Duration::from_millis(300), json!(1));
    let b_task = answer_after(b_client, Duration::from_millis(600), json!(2));
    let c_task = answer_after(c_client, Duration::from_millis(100), json!(3));

    let started = Instant::now();
    let answers = game
        .input_all(&seats, &Pick::new(), Some(Duration::from_secs(1)), None)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let order: Vec<_> = answers
        .iter()
        .map(|(p, o)| (p.id().to_string(), o.copied()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), Some(1)),
            ("b".to_string(), Some(2)),
            ("c".to_string(), Some(3)),
        ]
    );

    assert_eq!(recorder.finished_actors(), ["c", "a", "b"]);
    assert!(recorder.finished().iter().all(|(_, raw, _)| raw.is_some()));

    // Every seat sees every acknowledgement, in arrival order.
    let mut a_client = a_task.await.unwrap();
    let _b_client = b_task.await.unwrap();
    let _c_client = c_task.await.unwrap();
    let acks = drain(&mut a_client);
    assert_eq!(tags(&acks), ["RI&:Pick:3", "RI&:Pick:1", "RI&:Pick:2"]);
    assert_eq!(acks[0].payload, json!(3));
}

/// X answers at once, Y would answer later: `any` returns X and never
/// flushes Y's real answer.
#[tokio::test(start_paused = true)]
async fn any_returns_the_first_useful_answer_and_cancels_the_rest() {
    let (x, x_client) = human("x");
    let (y, y_client) = human("y");
    let seats = vec![y, x];
    let (game, recorder) = new_game(seats.clone());

    let x_task = answer_after(x_client, Duration::from_millis(50), json!(9));
    let y_task = answer_after(y_client, Duration::from_secs(5), json!(4));

    let started = Instant::now();
    let (winner, result) = game
        .input_any(&seats, &Pick::new(), Some(TIMEOUT), None)
        .await
        .unwrap()
        .expect("x wins");
    let elapsed = started.elapsed();

    assert_eq!(winner.id().as_str(), "x");
    assert_eq!(result, 9);
    assert!(elapsed < Duration::from_secs(1), "returned after {elapsed:?}");

    // Y is settled as a timeout, not with its late answer.
    let finished = recorder.finished();
    assert_eq!(finished.len(), 2);
    assert_eq!(finished[0], ("x".to_string(), Some(json!(9)), Some(json!(9))));
    assert_eq!(finished[1], ("y".to_string(), None, None));

    // Y's late answer goes nowhere.
    let mut y_client = y_task.await.unwrap();
    let _x_client = x_task.await.unwrap();
    assert_eq!(recorder.finished().len(), 2);
    let acks = drain(&mut y_client);
    assert_eq!(tags(&acks), ["RI|:Pick:2", "RI|:Pick:1"]);
    assert_eq!(acks[1].payload, Value::Null);
}

/// The only participant disconnects before answering.
#[tokio::test(start_paused = true)]
async fn single_participant_disconnect_runs_the_empty_answer_path() {
    let (seat, client) = human("solo");
    let (watcher, mut watcher_client) = human("watcher");
    let (game, recorder) = new_game(vec![seat.clone(), watcher]);
    drop(client);

    let result = game
        .input_single(&seat, &Pick::with_fallback(-1), None, None)
        .await
        .unwrap();

    assert_eq!(result, Some(-1));
    assert_eq!(
        recorder.finished(),
        [("solo".to_string(), None, Some(json!(-1)))]
    );

    let acks = drain(&mut watcher_client);
    assert_eq!(tags(&acks), ["RI:Pick:1"]);
    assert_eq!(acks[0].payload, Value::Null);
}

/// Two humans and one bot under `all`, driven through the ambient helper.
#[tokio::test(start_paused = true)]
async fn synthetic_answers_merge_without_a_round_trip() {
    let (h1, h1_client) = human("h1");
    let (h2, h2_client) = human("h2");
    let robot = bot("robot", Some(7));
    let seats = vec![h1, robot, h2];
    let (game, recorder) = new_game(seats.clone());

    let h1_task = answer_after(h1_client, Duration::from_millis(200), json!(1));
    let h2_task = answer_after(h2_client, Duration::from_millis(100), json!(2));

    let answers = game
        .scope(input_all(&seats, &Pick::new(), None, None))
        .await
        .unwrap();

    let ids: Vec<_> = answers.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, ["h1", "robot", "h2"]);
    let values: Vec<_> = answers.iter().map(|(_, o)| o.copied()).collect();
    assert_eq!(values, [Some(1), Some(7), Some(2)]);
    assert_eq!(recorder.finished_actors()[0], "robot");

    // The bot's request never hit a wire; its acknowledgement did.
    let mut h1_client = h1_task.await.unwrap();
    let _h2_client = h2_task.await.unwrap();
    let frames = drain(&mut h1_client);
    assert!(!tags(&frames).contains(&"I&:Pick:2"));
    assert!(tags(&frames).contains(&"RI&:Pick:2"));
}
