//! Minimal explorer session walkthrough.
//!
//! Builds a small resource tree with lazy loading, attaches it to a
//! session, and prints the mirrored tree as the host widget would see it.
//!
//! Run with: cargo run --example explorer

use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudscape::{
    ActionSet, Dispatcher, EventBus, ExplorerSession, LoadState, MirrorKey, Node, NodeAction,
    Synchronizer, topics,
};

fn subscription(name: &str) -> Arc<Node> {
    let vms: Vec<Arc<Node>> = (1..=2)
        .map(|i| {
            Node::builder(format!("vm-{:02}", i))
                .actions(
                    ActionSet::new()
                        .with_primary(Arc::new(NodeAction::new("Open")))
                        .with_action(Arc::new(NodeAction::new("Delete").with_group(1))),
                )
                .build()
        })
        .collect();
    Node::builder(name.to_string())
        .supplier(Arc::new(move |_token| Ok(vms.clone())))
        .build()
}

fn print_tree(sync: &Synchronizer, key: MirrorKey, depth: usize) {
    if let Some(node) = sync.node_at(key) {
        println!("{}{}", "  ".repeat(depth), node.label());
    }
    for child in sync.with_mirror(|m| m.children_of(key)) {
        print_tree(sync, child, depth + 1);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dispatcher = Arc::new(Dispatcher::spawn("explorer"));
    let bus = Arc::new(EventBus::new());
    let session = ExplorerSession::builder(dispatcher.clone(), bus.clone()).build()?;

    let root = Node::builder("subscriptions").label("Subscriptions").build();
    let contoso = subscription("contoso-prod");
    let fabrikam = subscription("fabrikam-dev");
    root.add_child(contoso.clone());
    root.add_child(fabrikam);
    session.attach_root(root)?;

    session.on_reveal_requested().connect(|key| {
        println!("reveal requested for mirror entry {:?}", key);
    });

    // Expand both subscriptions the way a double click would.
    for key in session.synchronizer().with_mirror(|m| {
        let root = m.root();
        m.children_of(root)
            .into_iter()
            .flat_map(|k| m.children_of(k))
            .collect::<Vec<_>>()
    }) {
        session.on_primary_activate(key);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while contoso.load_state() != LoadState::Loaded && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let sync = session.synchronizer();
    let root_key = sync.with_mirror(|m| m.root());
    print_tree(sync, root_key, 0);

    // A distant component can ask for a resource to be brought into view.
    bus.publish(topics::FOCUS_RESOURCE, Arc::new(contoso.id()));

    session.close();
    dispatcher.stop_and_join();
    Ok(())
}
