//! Store behaviour against the no-op adapter.

use cardbox_client::persistence::{AdapterCall, NoopAdapter};
use cardbox_client::{
    Adapters, AppContext, CardsStore, Config, Connectivity, StacksStore, StoreOptions, TagsStore,
};
use cardbox_engine::{Card, Setting, Stack, Tag};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

async fn wait_for<T: Clone>(rx: &mut broadcast::Receiver<T>, matches: impl Fn(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(value) = rx.recv().await {
                if matches(&value) {
                    return value;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for publish")
}

struct Fixture {
    stacks: Arc<StacksStore>,
    stack_adapter: Arc<NoopAdapter<Stack>>,
    tag_adapter: Arc<NoopAdapter<Tag>>,
}

fn fixture(connectivity: Connectivity, echo: bool) -> Fixture {
    let (stack_adapter, tag_adapter): (Arc<NoopAdapter<Stack>>, Arc<NoopAdapter<Tag>>) = if echo {
        (Arc::new(NoopAdapter::echoing()), Arc::new(NoopAdapter::echoing()))
    } else {
        (Arc::new(NoopAdapter::new()), Arc::new(NoopAdapter::new()))
    };
    let options = StoreOptions {
        echo_timeout: Some(Duration::from_millis(250)),
    };
    let tags = Arc::new(TagsStore::tags(
        tag_adapter.clone(),
        connectivity.clone(),
        options,
    ));
    let stacks = Arc::new(StacksStore::new(
        stack_adapter.clone(),
        tags,
        connectivity,
        options,
    ));
    Fixture {
        stacks,
        stack_adapter,
        tag_adapter,
    }
}

#[tokio::test]
async fn offline_create_updates_map_without_backend() {
    let f = fixture(Connectivity::offline(), false);
    let mut collection = f.stacks.subscribe_collection();
    let mut entity = f.stacks.subscribe_entity();

    f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();

    // Both channels have fired by the time the call returns.
    assert_eq!(collection.try_recv().unwrap()[0].id, "s1");
    assert_eq!(entity.try_recv().unwrap().id, "s1");
    assert!(f.stacks.get("s1").is_some());
    assert_eq!(f.stack_adapter.call_count(), 0);
}

#[tokio::test]
async fn null_entities_never_reach_the_backend() {
    let f = fixture(Connectivity::online(), true);

    let err = f.stacks.create(Stack::new("", "", 1)).await.unwrap_err();
    assert!(err.is_invalid_argument());
    let err = f.stacks.update(Stack::new("", "", 1)).await.unwrap_err();
    assert!(err.is_invalid_argument());

    assert_eq!(f.stack_adapter.call_count(), 0);
    assert_eq!(f.tag_adapter.call_count(), 0);
}

#[tokio::test]
async fn collection_is_published_newest_first() {
    let f = fixture(Connectivity::offline(), false);
    let mut collection = f.stacks.subscribe_collection();

    f.stacks
        .create_many(vec![
            Stack::new("t1", "one", 1_000),
            Stack::new("t3", "three", 3_000),
            Stack::new("t2", "two", 2_000),
        ])
        .await
        .unwrap();

    let published: Vec<String> = collection
        .try_recv()
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(published, vec!["t3", "t2", "t1"]);
}

#[tokio::test]
async fn online_write_waits_for_backend_echo() {
    let f = fixture(Connectivity::online(), true);
    let mut collection = f.stacks.subscribe_collection();

    f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();

    assert_eq!(
        f.stack_adapter.calls(),
        vec![AdapterCall::Create(vec!["s1".to_string()])]
    );
    wait_for(&mut collection, |stacks| stacks.iter().any(|s| s.id == "s1")).await;
    assert!(f.stacks.get("s1").is_some());
}

#[tokio::test]
async fn writes_follow_connectivity() {
    let connectivity = Connectivity::offline();
    let f = fixture(connectivity.clone(), true);

    f.stacks.create(Stack::new("s1", "offline", 1)).await.unwrap();
    assert_eq!(f.stack_adapter.call_count(), 0);

    connectivity.set_online(true);
    f.stacks.create(Stack::new("s2", "online", 2)).await.unwrap();
    assert_eq!(f.stack_adapter.call_count(), 1);
    assert!(f.stacks.get("s1").is_some());
    assert!(f.stacks.get("s2").is_some());
}

#[tokio::test]
async fn offline_delete_removes_locally() {
    let f = fixture(Connectivity::offline(), false);
    let stack = f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();

    f.stacks.delete(stack).await.unwrap();

    assert!(f.stacks.is_empty());
    assert_eq!(f.stack_adapter.call_count(), 0);
}

#[tokio::test]
async fn backend_errors_reach_the_error_channel() {
    let f = fixture(Connectivity::online(), false);
    let mut errors = f.stacks.subscribe_errors();
    f.stack_adapter.fail_with("quota exceeded");

    let result = f.stacks.create(Stack::new("s1", "Spanish", 1)).await;

    assert!(result.is_err());
    let message = wait_for(&mut errors, |_| true).await;
    assert!(message.contains("quota exceeded"));
    assert!(f.stacks.get("s1").is_none());
}

#[tokio::test]
async fn find_by_id_focuses_the_entity() {
    let f = fixture(Connectivity::online(), true);
    f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();
    let mut entity = f.stacks.subscribe_entity();

    f.stacks
        .find_by_id("s1", &cardbox_client::Scope::global())
        .await
        .unwrap();

    assert_eq!(wait_for(&mut entity, |_| true).await.id, "s1");
    assert_eq!(f.stacks.focused().map(|s| s.id).as_deref(), Some("s1"));
}

#[tokio::test]
async fn leitner_operations_persist_through_the_stack() {
    let f = fixture(Connectivity::offline(), false);
    let cards = CardsStore::new(Arc::clone(&f.stacks));
    let stack = f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();
    cards.initialize_stack(stack);

    for (id, front) in [("a", "uno"), ("b", "dos"), ("c", "tres"), ("d", "cuatro")] {
        cards.create(Card::new(id, front, "", 1)).await.unwrap();
    }
    cards.move_to_next_box("a").await.unwrap();
    cards.move_to_next_box("a").await.unwrap();
    assert_eq!(f.stacks.get("s1").unwrap().card("a").unwrap().box_number, Some(2));

    let stack = cards.shuffle_with(&mut StdRng::seed_from_u64(7)).await.unwrap();
    let indices: BTreeSet<i64> = stack.cards.iter().filter_map(|c| c.index).collect();
    assert_eq!(indices, (0..4).collect());
    assert_eq!(f.stacks.get("s1").unwrap(), stack);

    let stack = cards.move_all_to_first_box().await.unwrap();
    assert!(stack.cards.iter().all(|c| c.box_number == Some(0)));

    cards.delete(&stack.cards[0]).await.unwrap();
    assert_eq!(f.stacks.get("s1").unwrap().cards.len(), 3);
}

#[tokio::test]
async fn normalize_is_idempotent_and_persisted() {
    let f = fixture(Connectivity::offline(), false);
    let cards = CardsStore::new(Arc::clone(&f.stacks));
    let mut stack = Stack::new("s1", "Spanish", 1);
    stack.cards = vec![
        Card::new("a", "a", "a", 1).with_index(10),
        Card::new("b", "b", "b", 1).with_index(-4),
        Card::new("c", "c", "c", 1),
    ];
    let stack = f.stacks.create(stack).await.unwrap();
    cards.initialize_stack(stack);

    let once = cards.normalize_indices().await.unwrap();
    let twice = cards.normalize_indices().await.unwrap();

    let indices = |s: &Stack| s.cards.iter().map(|c| c.index).collect::<Vec<_>>();
    assert_eq!(indices(&once), vec![Some(0), Some(1), Some(2)]);
    assert_eq!(indices(&once), indices(&twice));
    assert_eq!(indices(&f.stacks.get("s1").unwrap()), indices(&twice));
}

#[tokio::test]
async fn echo_of_the_focused_stack_refreshes_cards() {
    let f = fixture(Connectivity::online(), true);
    let cards = CardsStore::new(Arc::clone(&f.stacks));
    let stack = f.stacks.create(Stack::new("s1", "Spanish", 1)).await.unwrap();
    cards.initialize_stack(stack.clone());
    let mut view = cards.subscribe();

    let mut edited = stack;
    edited.cards.push(Card::new("a", "uno", "one", 1).with_index(0));
    f.stacks.update(edited).await.unwrap();

    let published = wait_for(&mut view, |cards| cards.len() == 1).await;
    assert_eq!(published[0].id, "a");
}

#[tokio::test]
async fn filtered_view_follows_filter_and_cards() {
    let context = AppContext::with_adapters(
        Config::local("unused.db"),
        Connectivity::offline(),
        Adapters {
            stacks: Arc::new(NoopAdapter::<Stack>::new()),
            tags: Arc::new(NoopAdapter::<Tag>::new()),
            settings: Arc::new(NoopAdapter::<Setting>::new()),
        },
    );
    let a = Card::new("A", "a", "a", 1).with_index(1).with_tags(["x"]);
    let mut b = Card::new("B", "b", "b", 1).with_index(0).with_tags(["y"]);
    b.favorite = true;
    let mut stack = Stack::new("s1", "Spanish", 1);
    stack.cards = vec![a, b];
    context.cards().initialize_stack(stack);

    let view = context.filter().watch_cards(context.cards());
    let mut filtered = view.subscribe();
    let ids = |cards: &Vec<Card>| cards.iter().map(|c| c.id.clone()).collect::<Vec<_>>();

    context.filter().select_tag("x");
    let published = wait_for(&mut filtered, |_| true).await;
    assert_eq!(ids(&published), vec!["A"]);

    context.filter().set_favorites(true);
    let published = wait_for(&mut filtered, |_| true).await;
    assert!(published.is_empty());

    context.filter().clear_all_filters();
    let published = wait_for(&mut filtered, |_| true).await;
    assert_eq!(ids(&published), vec!["A", "B"]);
}
