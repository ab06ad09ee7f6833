use std::env;
use std::fs;
use std::process;
use anyhow::Result;
use crate::fixture::{key, record};
use super::{Augment, Enrich, Object, Owner};

fn pod(ip: &str, name: &str) -> Result<Object> {
    Ok(Object {
        ip:    ip.parse()?,
        kind:  "Pod".to_owned(),
        name:  name.to_owned(),
        ns:    "default".to_owned(),
        node:  Some("node-1".to_owned()),
        owner: Some(Owner {
            kind: "Deployment".to_owned(),
            name: "web".to_owned(),
        }),
    })
}

#[test]
fn enrich_both_ends() -> Result<()> {
    let augment = Augment::new();
    augment.update(vec![pod("10.0.0.1", "web-1")?, pod("10.0.0.2", "db-1")?]);

    let meta = augment.enrich(&key("10.0.0.1", 4000, "10.0.0.2", 5432)).expect("meta");
    assert_eq!(meta.src.map(|o| o.name.clone()), Some("web-1".to_owned()));
    assert_eq!(meta.dst.map(|o| o.name.clone()), Some("db-1".to_owned()));

    let meta = augment.enrich(&key("10.0.0.1", 4000, "8.8.8.8", 53)).expect("meta");
    assert!(meta.src.is_some());
    assert!(meta.dst.is_none());

    assert!(augment.enrich(&key("1.1.1.1", 1, "8.8.8.8", 53)).is_none());

    Ok(())
}

#[test]
fn update_replaces_table() -> Result<()> {
    let augment = Augment::new();
    augment.update(vec![pod("10.0.0.1", "web-1")?]);
    augment.update(vec![pod("10.0.0.2", "db-1")?]);

    assert_eq!(augment.len(), 1);
    assert!(augment.enrich(&key("10.0.0.1", 1, "9.9.9.9", 53)).is_none());

    Ok(())
}

#[test]
fn merge_keeps_existing() -> Result<()> {
    let augment = Augment::new();
    augment.update(vec![pod("10.0.0.1", "web-1")?]);

    let k = key("10.0.0.1", 4000, "10.0.0.2", 80);
    let mut rs = vec![record(k, 0, 1, 1, 0), record(k, 0, 1, 1, 0)];
    rs[1].meta = Some(Default::default());

    augment.merge(&mut rs);

    assert!(rs[0].meta.as_ref().and_then(|m| m.src.as_ref()).is_some());
    assert!(rs[1].meta.as_ref().and_then(|m| m.src.as_ref()).is_none());

    Ok(())
}

#[test]
fn load_file() -> Result<()> {
    let path = env::temp_dir().join(format!("augment-{}.json", process::id()));
    let objs = vec![pod("10.0.0.1", "web-1")?];
    fs::write(&path, serde_json::to_vec(&objs)?)?;

    let loaded = Augment::load(&path);
    fs::remove_file(&path)?;

    assert_eq!(loaded?, objs);

    Ok(())
}
