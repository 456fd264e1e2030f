//! Seat behavior across disconnects, reconnects and reveals.

use std::sync::Arc;
use std::time::Duration;

use arbiter_engine::{
    ChannelTransport, GameError, NetworkParticipant, Participant, ParticipantSnapshot, Presence,
    reveal,
};
use serde_json::json;
use tokio::time::{Instant, sleep};

use crate::common::{Pick, answer_after, bot, drain, new_game, next_request};

#[tokio::test(start_paused = true)]
async fn disconnect_mid_wait_resolves_as_no_answer() {
    let (transport, mut client) = ChannelTransport::pair();
    let seat: Arc<dyn Participant> = Arc::new(NetworkParticipant::new("flaky", transport));
    let (game, recorder) = new_game(vec![seat.clone()]);

    let dropper = tokio::spawn(async move {
        next_request(&mut client).await;
        sleep(Duration::from_millis(300)).await;
        drop(client);
    });

    let started = Instant::now();
    let result = game
        .input_single(&seat, &Pick::new(), None, None)
        .await
        .unwrap();
    dropper.await.unwrap();

    assert_eq!(result, None);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(recorder.finished(), [("flaky".to_string(), None, None)]);
    assert_eq!(seat.presence(), Presence::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn reconnected_seat_answers_on_the_new_connection() {
    let (old, old_client) = ChannelTransport::pair();
    let seat = Arc::new(NetworkParticipant::new("phoenix", old));
    let as_participant: Arc<dyn Participant> = seat.clone();
    let (game, _recorder) = new_game(vec![as_participant.clone()]);

    drop(old_client);
    seat.set_dropped(true);
    assert_eq!(game.snapshots()[0].state, Presence::Dropped);

    let (new, new_client) = ChannelTransport::pair();
    seat.reconnect(new);
    let answering = answer_after(new_client, Duration::from_millis(20), json!(6));

    let result = game
        .input_single(&as_participant, &Pick::new(), None, None)
        .await
        .unwrap();
    let _client = answering.await.unwrap();

    assert_eq!(result, Some(6));
    assert_eq!(
        game.snapshots(),
        [ParticipantSnapshot {
            account: "phoenix".into(),
            state: Presence::InGame,
        }]
    );
}

#[tokio::test]
async fn snapshots_report_each_seat_state() {
    let (gone, gone_client) = ChannelTransport::pair();
    let (here, _here_client) = ChannelTransport::pair();
    let fled = Arc::new(NetworkParticipant::new("fled", gone));
    let seats: Vec<Arc<dyn Participant>> = vec![
        fled.clone(),
        Arc::new(NetworkParticipant::new("here", here)),
        bot("bot", None),
    ];
    let (game, _recorder) = new_game(seats);

    drop(gone_client);
    fled.set_dropped(true);
    fled.set_fled(true);

    let json = serde_json::to_value(game.snapshots()).unwrap();
    assert_eq!(
        json,
        json!([
            { "account": "fled", "state": "fled" },
            { "account": "here", "state": "ingame" },
            { "account": "bot", "state": "ingame" },
        ])
    );
}

#[tokio::test]
async fn reveal_uses_the_shared_counter() {
    let (transport, mut client) = ChannelTransport::pair();
    let human: Arc<dyn Participant> = Arc::new(NetworkParticipant::new("h", transport));
    let robot = bot("r", None);
    let (game, _recorder) = new_game(vec![human.clone(), robot.clone()]);

    let tags = game
        .scope(async {
            let first = reveal(human.as_ref(), &json!({ "card": 3 }))?;
            let second = reveal(robot.as_ref(), &json!({ "card": 9 }))?;
            let third = reveal(human.as_ref(), &json!({ "card": 5 }))?;
            Ok::<_, GameError>([first, second, third])
        })
        .await
        .unwrap();

    assert_eq!(tags, [1, 2, 3]);
    let frames = drain(&mut client);
    let seen: Vec<_> = frames
        .iter()
        .map(|f| (f.tag.as_str(), f.payload["card"].clone()))
        .collect();
    assert_eq!(seen, [("Sync:1", json!(3)), ("Sync:3", json!(5))]);
}
