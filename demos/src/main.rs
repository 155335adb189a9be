use serde::{Deserialize, Serialize};

use smkes::backend::memory::MemoryBackend;
use smkes::engine::{CacheEngine, Outcome, UpdateStrategy};
use smkes::key::Params;
use smkes::record::{RecordIdentity, ScalarValue};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

impl RecordIdentity for User {
    fn type_tag(&self) -> &'static str {
        "user"
    }

    fn primary_key(&self) -> Vec<ScalarValue> {
        vec![self.id.into()]
    }
}

#[tokio::main]
async fn main() {
    println!("Hello, smkes!");

    run().await;

    println!("Bye~");
}

async fn run() {
    let engine = CacheEngine::new(MemoryBackend::new());

    let params = Params::new();

    // First read misses and runs the fetch callback.
    let outcome = engine
        .read("find_user", &params, None, || async {
            Outcome::Record(User { id: 5, name: "ada".to_string() })
        })
        .await;
    print_user("first read (miss)", outcome);

    // Second read for the same key/params hits the cache; the fetch
    // callback is never invoked.
    let outcome = engine
        .read("find_user", &params, None, || async {
            panic!("fetch should not run on a cache hit")
        })
        .await;
    print_user("second read (hit)", outcome);

    // Updating the record through the engine evicts every cache entry
    // that embeds it, so the next read runs the fetch callback again.
    engine
        .update(
            || async { Outcome::Record(User { id: 5, name: "ada lovelace".to_string() }) },
            UpdateStrategy::Evict,
            None,
        )
        .await;

    let outcome = engine
        .read("find_user", &params, None, || async {
            Outcome::Record(User { id: 5, name: "ada lovelace".to_string() })
        })
        .await;
    print_user("read after update", outcome);

    println!("stats: {:?}", engine.stats());
}

fn print_user(label: &str, outcome: Outcome<User>) {
    match outcome {
        Outcome::Record(user) => println!("{label}: {} -> {}", user.id, user.name),
        Outcome::List(users) => println!("{label}: {} users", users.len()),
        Outcome::Err(e) => println!("{label}: error: {e}"),
    }
}
