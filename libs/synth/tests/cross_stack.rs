//! Cross-stack references and assembly output.

use jci_synth::{
    App, AssemblyManifest, AvailabilityZones, Context, Environment, StackProps, SynthError,
};
use jci_template::{Expr, Resource};
use serde_json::json;

fn props(env: Environment) -> StackProps {
    StackProps {
        env,
        ..Default::default()
    }
}

/// Producer with a VPC and a subnet; returns (vpc ref, subnet zone) attrs.
fn producer(app: &mut App) -> (jci_synth::Attr, jci_synth::Attr) {
    let stack = app.new_stack("Network", StackProps::default()).unwrap();
    let root = stack.path();
    let vpc = stack
        .add_resource(
            &root.child("vpc").unwrap().child("Resource").unwrap(),
            Resource::new("AWS::EC2::VPC"),
        )
        .unwrap();
    let mut subnet = Resource::new("AWS::EC2::Subnet");
    subnet.set_property("VpcId", Expr::reference(&vpc));
    let subnet = stack
        .add_resource(&root.child("vpc").unwrap().child("Subnet1").unwrap(), subnet)
        .unwrap();
    (
        stack.ref_attr(&vpc),
        stack.get_att(&subnet, "AvailabilityZone"),
    )
}

#[test]
fn same_stack_reference_is_unchanged() {
    let mut app = App::new(Context::new());
    let (vpc, _) = producer(&mut app);
    let id = vpc.owner();
    let stack = app.stack_mut(id).unwrap();
    assert_eq!(stack.resolve(&vpc).unwrap(), vpc.expr().clone());
}

#[test]
fn earlier_stack_reference_becomes_import() {
    let mut app = App::new(Context::new());
    let (vpc, zone) = producer(&mut app);

    let consumer = app.new_stack("Agent", StackProps::default()).unwrap();
    let vpc_value = consumer.resolve(&vpc).unwrap();
    let zone_value = consumer.resolve(&zone).unwrap();

    let vpc_name = match &vpc_value {
        Expr::ImportValue(name) => name.as_literal_str().unwrap().to_string(),
        other => panic!("expected import, got {:?}", other),
    };
    assert!(vpc_name.starts_with("Network:ExportsOutputRefvpc"));
    match &zone_value {
        Expr::ImportValue(name) => assert!(name
            .as_literal_str()
            .unwrap()
            .starts_with("Network:ExportsOutputFnGetAttvpcSubnet1")),
        other => panic!("expected import, got {:?}", other),
    }
    assert!(consumer.dependencies().contains("Network"));

    let mut instance = Resource::new("AWS::EC2::Instance");
    instance.set_property("VpcId", vpc_value);
    let path = consumer.path().child("agent").unwrap();
    consumer.add_resource(&path, instance).unwrap();

    let assembly = app.synth().unwrap();
    let network = assembly.stack("Network").unwrap();
    assert_eq!(network.template.outputs().len(), 2);
    let exported: Vec<String> = network
        .template
        .outputs()
        .values()
        .filter_map(|o| o.export_name().map(|n| n.to_string()))
        .collect();
    assert!(exported.contains(&vpc_name));

    let agent = assembly.stack("Agent").unwrap();
    assert_eq!(agent.dependencies, vec!["Network".to_string()]);
    assert_eq!(agent.template.imports(), vec![vpc_name]);
}

#[test]
fn reference_into_other_app_fails() {
    let mut controller_app = App::new(Context::new());
    let (vpc, _) = producer(&mut controller_app);

    let mut other = App::new(Context::new());
    let consumer = other.new_stack("Agent", StackProps::default()).unwrap();
    let err = consumer.resolve(&vpc).unwrap_err();
    assert!(matches!(err, SynthError::ForeignStack { .. }));
    assert!(err.is_reference_error());
}

#[test]
fn reference_to_later_stack_fails() {
    let mut app = App::new(Context::new());
    let early = app.new_stack("Early", StackProps::default()).unwrap().id();
    let (vpc, _) = producer(&mut app);

    let err = app.stack_mut(early).unwrap().resolve(&vpc).unwrap_err();
    assert!(matches!(err, SynthError::ReferenceToLaterStack { .. }));
}

#[test]
fn resource_outside_stack_rejected() {
    let mut app = App::new(Context::new());
    let other_path = app
        .new_stack("Other", StackProps::default())
        .unwrap()
        .path()
        .child("x")
        .unwrap();
    let stack = app.new_stack("Main", StackProps::default()).unwrap();
    assert!(matches!(
        stack.add_resource(&other_path, Resource::new("AWS::SNS::Topic")),
        Err(SynthError::PathOutsideStack { .. })
    ));
}

#[test]
fn resources_carry_construct_path() {
    let mut app = App::new(Context::new());
    let stack = app.new_stack("Main", StackProps::default()).unwrap();
    let path = stack.path().child("topic").unwrap();
    let id = stack.add_resource(&path, Resource::new("AWS::SNS::Topic")).unwrap();
    let resource = stack.template().resource(id.as_str()).unwrap();
    assert_eq!(resource.metadata.get("aws:cdk:path"), Some(&json!("Main/topic")));
}

#[test]
fn dangling_reference_fails_synthesis() {
    let mut app = App::new(Context::new());
    let stack = app.new_stack("Main", StackProps::default()).unwrap();
    let mut subnet = Resource::new("AWS::EC2::Subnet");
    subnet.set_property("VpcId", Expr::reference("NoSuchVpc"));
    let path = stack.path().child("subnet").unwrap();
    stack.add_resource(&path, subnet).unwrap();

    assert!(matches!(app.synth(), Err(SynthError::Template(_))));
}

#[test]
fn zones_from_context() {
    let context = Context::from_json(json!({
        "availability-zones:account=123456789012:region=us-east-1": ["us-east-1a", "us-east-1b", "us-east-1c"]
    }))
    .unwrap();
    let mut app = App::new(context);
    let stack = app
        .new_stack("Main", props(Environment::new("123456789012", "us-east-1")))
        .unwrap();
    assert_eq!(stack.availability_zones().len(), 3);

    let assembly = app.synth().unwrap();
    assert!(assembly.missing().is_empty());
}

#[test]
fn concrete_environment_without_zones_records_missing_context() {
    let mut app = App::new(Context::new());
    let stack = app
        .new_stack("Main", props(Environment::new("123456789012", "eu-west-1")))
        .unwrap();
    assert_eq!(stack.availability_zones(), AvailabilityZones::agnostic());
    stack.availability_zones();

    let assembly = app.synth().unwrap();
    assert_eq!(assembly.missing().len(), 1);
    assert_eq!(
        assembly.missing()[0].key,
        "availability-zones:account=123456789012:region=eu-west-1"
    );
}

#[test]
fn agnostic_environment_records_nothing() {
    let mut app = App::new(Context::new());
    let stack = app.new_stack("Main", StackProps::default()).unwrap();
    assert_eq!(stack.availability_zones().len(), 2);
    assert!(app.synth().unwrap().missing().is_empty());
}

#[test]
fn assembly_written_to_disk() {
    let mut app = App::new(Context::new());
    let (vpc, _) = producer(&mut app);
    let consumer = app.new_stack("Agent", StackProps::default()).unwrap();
    let value = consumer.resolve(&vpc).unwrap();
    let mut sg = Resource::new("AWS::EC2::SecurityGroup");
    sg.set_property("VpcId", value);
    let path = consumer.path().child("sg").unwrap();
    consumer.add_resource(&path, sg).unwrap();

    let assembly = app.synth().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let written = assembly.write(dir.path()).unwrap();

    assert!(dir.path().join("Network.template.json").exists());
    assert!(dir.path().join("Agent.template.json").exists());

    let loaded = AssemblyManifest::load(dir.path()).unwrap();
    assert_eq!(loaded, written);
    assert_eq!(loaded.artifacts.len(), 2);
    let agent = loaded.artifact("Agent").unwrap();
    assert_eq!(agent.dependencies, vec!["Network".to_string()]);
    assert_eq!(agent.environment, "aws://unknown-account/unknown-region");
    assert_eq!(agent.properties.template_file, "Agent.template.json");

    let text = std::fs::read_to_string(dir.path().join("Agent.template.json")).unwrap();
    let template: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        jci_template::TemplateHash::from_json(&template),
        agent.template_hash
    );
}
