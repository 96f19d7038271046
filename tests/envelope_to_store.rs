//! Exercises the full external-interface path: wire bytes in, committed
//! store state out. Builds an envelope by hand with [`Builder`] rather than
//! pulling in `serde_json` (that helper is test-only inside the crate and
//! not reachable from here), mirroring the unit tests in `src/schema/mod.rs`.

use agency_store::deser::Deserialize as _;
use agency_store::schema::envelope_deserializer;
use agency_store::wire::{Builder, Slice};
use agency_store::{Node, Path, Store, TransactOutcome};

fn build_envelope_bytes() -> Vec<u8> {
    let mut b = Builder::new();
    b.open_array(); // envelope: one transaction

    b.open_array(); // transaction 0
    b.open_object(); // operations
    b.key("arango/Plan/Version");
    b.open_object();
    b.key("op");
    b.append_string("set");
    b.key("new");
    b.append_double(1.0);
    b.close_object();
    b.close_object();
    b.open_object(); // preconditions (none)
    b.close_object();
    b.append_string("client-a");
    b.close_array();

    b.open_array(); // transaction 1: increments Version, guarded by its value
    b.open_object();
    b.key("arango/Plan/Version");
    b.open_object();
    b.key("op");
    b.append_string("increment");
    b.close_object();
    b.close_object();
    b.open_object();
    b.key("arango/Plan/Version");
    b.open_object();
    b.key("old");
    b.append_double(1.0);
    b.close_object();
    b.close_object();
    b.append_string("client-b");
    b.close_array();

    b.close_array();
    b.finish()
}

#[test]
fn wire_bytes_apply_through_to_committed_store_state() {
    let bytes = build_envelope_bytes();
    let slice = Slice::new(&bytes).unwrap();
    let envelope = envelope_deserializer()
        .deserialize(slice)
        .expect("envelope parses");

    let store = Store::new();
    let outcomes = store.apply_envelope(&envelope).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], TransactOutcome::Committed(_)));
    assert!(matches!(outcomes[1], TransactOutcome::Committed(_)));

    let root = store.read().unwrap();
    assert_eq!(
        Node::get(&root, &Path::parse("arango/Plan/Version"))
            .unwrap()
            .as_double(),
        Some(2.0)
    );
    store.stop();
}

#[test]
fn wire_bytes_with_failing_precondition_reports_without_committing() {
    let mut b = Builder::new();
    b.open_array(); // envelope

    b.open_array(); // transaction 0: precondition guards on a value that never holds
    b.open_object();
    b.key("flag");
    b.open_object();
    b.key("op");
    b.append_string("set");
    b.key("new");
    b.append_bool(true);
    b.close_object();
    b.close_object();
    b.open_object();
    b.key("flag");
    b.open_object();
    b.key("oldEmpty");
    b.append_bool(false); // requires "flag" to already be present
    b.close_object();
    b.close_object();
    b.append_string("client-c");
    b.close_array();

    b.close_array();
    let bytes = b.finish();
    let slice = Slice::new(&bytes).unwrap();
    let envelope = envelope_deserializer()
        .deserialize(slice)
        .expect("envelope parses");

    let store = Store::new();
    let outcomes = store.apply_envelope(&envelope).unwrap();
    assert_eq!(outcomes, vec![TransactOutcome::PreconditionFailed]);
    assert!(Node::get(&store.read().unwrap(), &Path::parse("flag")).is_none());
    store.stop();
}
