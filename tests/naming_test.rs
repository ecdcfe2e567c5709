use std::sync::Arc;

use kairo::EventChannelFactory;
use kairo::config::ChannelConfig;
use kairo::event::Event;
use kairo::naming::{BindingType, Name, NamingContext, Resolved};

#[tokio::test]
async fn test_channel_discovery_via_naming() {
    let naming = NamingContext::new();
    let factory = EventChannelFactory::new(naming.clone(), ChannelConfig::default());
    let channel = factory.create_named_channel("orders").unwrap();

    // 別のファクトリからも同じチャネルが見える
    let other = EventChannelFactory::new(naming.clone(), ChannelConfig::default());
    let found = other.lookup("orders").unwrap();
    assert_eq!(found.id(), channel.id());

    // ネーミングサービス上では通常のオブジェクトバインディング
    match naming
        .resolve(&Name::single("orders", "EventChannel"))
        .unwrap()
    {
        Resolved::Object(_) => {}
        Resolved::Context(_) => panic!("expected object binding"),
    }

    channel.destroy().await;
}

#[tokio::test]
async fn test_looked_up_channel_delivers() {
    let naming = NamingContext::new();
    let factory = EventChannelFactory::new(naming.clone(), ChannelConfig::default());
    factory.create_named_channel("live").unwrap();

    let other = EventChannelFactory::new(naming, ChannelConfig::default());
    let channel = other.lookup("live").unwrap();

    let supplier = channel.for_consumers().unwrap().obtain_pull_supplier();
    supplier.connect_pull_consumer(None).unwrap();

    let publisher = channel.for_suppliers().unwrap().obtain_push_consumer();
    publisher.connect_push_supplier(None).unwrap();
    publisher.push(Event::new(99u32)).unwrap();

    let event = supplier.pull().await.unwrap();
    assert_eq!(*event.downcast_ref::<u32>().unwrap(), 99);

    channel.destroy().await;
}

#[test]
fn test_hierarchical_contexts() {
    let root = NamingContext::new();
    let region = root.bind_new_context(&Name::single("eu", "region")).unwrap();
    region
        .bind(&Name::single("config", ""), Arc::new(42u32))
        .unwrap();

    let resolved = root.resolve(&Name::from_string("eu.region/config")).unwrap();
    match resolved {
        Resolved::Object(object) => assert_eq!(*object.downcast::<u32>().unwrap(), 42),
        Resolved::Context(_) => panic!("expected object"),
    }

    let (bindings, iterator) = root.list(10);
    assert!(iterator.is_none());
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].binding_type, BindingType::Context);
    assert_eq!(bindings[0].name.to_string(), "eu.region");
}
