//! Collection properties: completeness, short-circuiting, tag uniqueness,
//! transaction bracketing and termination.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arbiter_engine::{Collected, GameError, Participant, Policy};
use serde_json::json;
use tokio::time::{Instant, sleep};

use crate::common::{
    Event, GRACE, Pick, answer_after, bot, drain, human, new_game, next_request, tags,
};

/// The paused clock lands on timer deadlines, give or take a timer tick.
fn assert_near(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "elapsed {elapsed:?}, expected about {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn all_is_complete_when_seats_stay_silent() {
    let (quiet, _quiet_client) = human("quiet");
    let (chatty, chatty_client) = human("chatty");
    let (mute, _mute_client) = human("mute");
    let seats = vec![quiet, chatty, bot("bot", None), mute];
    let (game, recorder) = new_game(seats.clone());
    let timeout = Duration::from_secs(2);

    let _chatty = answer_after(chatty_client, Duration::from_millis(10), json!(5));
    let started = Instant::now();
    let answers = game
        .input_all(&seats, &Pick::new(), Some(timeout), None)
        .await
        .unwrap();

    assert_near(started.elapsed(), timeout + GRACE);
    assert_eq!(answers.len(), seats.len());
    let ids: Vec<_> = answers.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, ["quiet", "chatty", "bot", "mute"]);
    let values: Vec<_> = answers.iter().map(|(_, o)| o.copied()).collect();
    assert_eq!(values, [None, Some(5), None, None]);

    // Answered seats first (arrival order), then timeouts in request order.
    assert_eq!(recorder.finished_actors(), ["bot", "chatty", "quiet", "mute"]);
}

#[tokio::test(start_paused = true)]
async fn any_without_a_winner_waits_for_the_deadline() {
    let (silent, _client) = human("silent");
    let seats = vec![bot("passer", None), silent];
    let (game, recorder) = new_game(seats.clone());
    let timeout = Duration::from_secs(3);

    let started = Instant::now();
    let winner = game
        .input_any(&seats, &Pick::new(), Some(timeout), None)
        .await
        .unwrap();

    assert!(winner.is_none());
    assert_near(started.elapsed(), timeout + GRACE);
    assert_eq!(recorder.finished_actors(), ["passer", "silent"]);
}

#[tokio::test(start_paused = true)]
async fn any_without_a_winner_returns_once_everyone_passed() {
    let seats = vec![bot("a", None), bot("b", None)];
    let (game, _recorder) = new_game(seats.clone());

    let started = Instant::now();
    let collected = game
        .user_input(&seats, &Pick::new(), Policy::Any, None, None)
        .await
        .unwrap();

    assert!(matches!(collected, Collected::Any(None)));
    assert!(started.elapsed() < GRACE);
}

/// Pins down which non-winning units `any` flushes: a unit buffered before
/// the winner is emitted with its real answer; a seat still waiting is
/// synthesized as a timeout.
#[tokio::test(start_paused = true)]
async fn any_flushes_buffered_losers_and_synthesizes_the_rest() {
    let (loser, loser_client) = human("loser");
    let (winner, winner_client) = human("winner");
    let (late, late_client) = human("late");
    let seats = vec![late, winner, loser];
    let (game, recorder) = new_game(seats.clone());

    let _loser = answer_after(loser_client, Duration::from_millis(100), json!("pass"));
    let _winner = answer_after(winner_client, Duration::from_millis(200), json!(3));
    let late_task = answer_after(late_client, Duration::from_secs(1), json!(8));

    let (seat, result) = game
        .input_any(&seats, &Pick::new(), None, None)
        .await
        .unwrap()
        .expect("winner");
    assert_eq!(seat.id().as_str(), "winner");
    assert_eq!(result, 3);

    assert_eq!(
        recorder.finished(),
        [
            ("loser".to_string(), Some(json!("pass")), None),
            ("winner".to_string(), Some(json!(3)), Some(json!(3))),
            ("late".to_string(), None, None),
        ]
    );

    // The late answer arrives after cancellation and changes nothing.
    let mut late_client = late_task.await.unwrap();
    assert_eq!(recorder.finished().len(), 3);
    let acks = drain(&mut late_client);
    assert_eq!(acks.last().map(|f| f.payload.clone()), Some(json!(null)));
}

/// Both bots answer at once; the second finishes before it is collected,
/// but the winner has already been picked, so its answer is thrown away.
#[tokio::test(start_paused = true)]
async fn any_discards_answers_finished_during_cancellation() {
    let first = bot("first", Some(1));
    let second = bot("second", Some(2));
    let (watcher, mut watcher_client) = human("watcher");
    let (game, recorder) = new_game(vec![first.clone(), second.clone(), watcher]);

    let (winner, result) = game
        .input_any(&[first, second], &Pick::new(), None, None)
        .await
        .unwrap()
        .expect("first wins");
    assert_eq!(winner.id().as_str(), "first");
    assert_eq!(result, 1);

    assert_eq!(
        recorder.finished(),
        [
            ("first".to_string(), Some(json!(1)), Some(json!(1))),
            ("second".to_string(), None, None),
        ]
    );
    let acks = drain(&mut watcher_client);
    assert_eq!(tags(&acks), ["RI|:Pick:1", "RI|:Pick:2"]);
    assert_eq!(acks[0].payload, json!(1));
    assert_eq!(acks[1].payload, json!(null));
}

#[tokio::test(start_paused = true)]
async fn single_is_the_unwrapped_all() {
    let seat = bot("solo", Some(12));
    let (game, _recorder) = new_game(vec![seat.clone()]);

    let single = game
        .input_single(&seat, &Pick::new(), None, None)
        .await
        .unwrap();
    let all = game
        .input_all(&[seat.clone()], &Pick::new(), None, None)
        .await
        .unwrap();

    assert_eq!(all.len(), 1);
    assert_eq!(single.as_ref(), all.get(seat.id()));
    assert_eq!(single, Some(12));

    let via_policy = game
        .user_input(&[seat], &Pick::new(), Policy::Single, None, None)
        .await
        .unwrap();
    assert!(matches!(via_policy, Collected::Single(Some(12))));
}

#[tokio::test(start_paused = true)]
async fn single_needs_exactly_one_participant() {
    let (game, recorder) = new_game(Vec::new());

    let err = game
        .user_input(&[], &Pick::new(), Policy::Single, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidRequest(_)));
    assert!(recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_prompts_never_share_a_tag() {
    let (a, a_client) = human("a");
    let (b, b_client) = human("b");
    let (c, c_client) = human("c");
    let (d, d_client) = human("d");
    let (game, recorder) = new_game(vec![a.clone(), b.clone(), c.clone(), d.clone()]);

    let clients = [a_client, b_client, c_client, d_client].map(|client| {
        answer_after(client, Duration::from_millis(10), json!(1))
    });

    let left = [a, b];
    let right = [c, d];
    let pick = Pick::new();
    let (first, second) = tokio::join!(
        game.input_all(&left, &pick, None, None),
        game.input_all(&right, &pick, None, None),
    );
    first.unwrap();
    second.unwrap();
    for client in clients {
        client.await.unwrap();
    }

    let started = recorder.started_tags();
    assert_eq!(started.len(), 4);
    assert_eq!(started.iter().collect::<HashSet<_>>().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn repeated_prompts_keep_counting() {
    let seat = bot("solo", Some(1));
    let (game, recorder) = new_game(vec![seat.clone()]);

    for _ in 0..3 {
        game.input_single(&seat, &Pick::new(), None, None)
            .await
            .unwrap();
    }
    game.reveal(seat.as_ref(), &json!("hand")).unwrap();
    game.input_single(&seat, &Pick::new(), None, None)
        .await
        .unwrap();

    assert_eq!(
        recorder.started_tags(),
        ["I:Pick:1", "I:Pick:2", "I:Pick:3", "I:Pick:5"]
    );
    assert_eq!(game.sync_tags_issued(), 5);
}

#[tokio::test(start_paused = true)]
async fn transactions_bracket_calls() {
    let seats: Vec<Arc<dyn Participant>> = vec![bot("a", Some(1)), bot("b", Some(2))];
    let (game, recorder) = new_game(seats.clone());

    game.input_all(&seats, &Pick::new(), None, None)
        .await
        .unwrap();
    {
        let ids = seats.iter().map(|s| s.id().clone()).collect();
        let scope = game.begin_transaction("Round", ids);
        game.input_all(&seats, &Pick::new(), None, Some(scope.transaction()))
            .await
            .unwrap();
        game.input_any(&seats, &Pick::new(), None, Some(scope.transaction()))
            .await
            .unwrap();
    }

    let brackets: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Begin(_) | Event::End(_)))
        .collect();
    assert_eq!(
        brackets,
        [
            Event::Begin("Pick".into()),
            Event::End("Pick".into()),
            Event::Begin("Round".into()),
            Event::End("Round".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn termination_ends_a_collection_early() {
    let (answers_fast, fast_client) = human("fast");
    let (never, mut never_client) = human("never");
    let seats = vec![answers_fast, never];
    let (game, recorder) = new_game(seats.clone());

    let _fast = answer_after(fast_client, Duration::from_millis(10), json!(4));
    let stopper = {
        let game = Arc::clone(&game);
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            game.terminate();
        })
    };

    let started = Instant::now();
    let answers = game
        .input_all(&seats, &Pick::new(), Some(Duration::from_secs(60)), None)
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_near(started.elapsed(), Duration::from_secs(1));
    let values: Vec<_> = answers.iter().map(|(_, o)| o.copied()).collect();
    assert_eq!(values, [Some(4), None]);
    assert_eq!(recorder.finished_actors(), ["fast", "never"]);
    assert!(matches!(recorder.events().last(), Some(Event::End(_))));

    // The request went out; the synthesized acknowledgement followed.
    let request = next_request(&mut never_client).await;
    assert_eq!(request.tag, "I&:Pick:2");
    assert_eq!(tags(&drain(&mut never_client)), ["RI&:Pick:1", "RI&:Pick:2"]);

    // Once terminating, no new collection can even get a tag.
    let err = game
        .input_all(&seats, &Pick::new(), None, None)
        .await
        .unwrap_err();
    assert!(err.is_terminating());
    assert!(matches!(recorder.events().last(), Some(Event::End(_))));
}
