//! End-to-end synthesis test.
//!
//! Builds the full deployment for a concrete environment, writes the cloud
//! assembly to disk, then checks it the way a deployment tool would see it:
//!
//! 1. Settings and context files are read
//! 2. Both stacks are synthesized; the agent deploys after the controller
//! 3. The written assembly passes offline validation
//! 4. Every agent import is exported by the controller
//! 5. Zone names come from the context file
//!
//! ## Running
//!
//! ```bash
//! cargo test -p jci-e2e --test synth_happy_path
//! ```

use std::path::Path;

use jci_stacks::{build_app, AppSettings, AGENT_STACK, CONTROLLER_STACK};
use jci_synth::{AssemblyManifest, Context, Environment};
use jci_testing::TemplateAssertions;
use serde_json::{json, Value};

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-east-1";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("cdk.context.json"),
        serde_json::to_string_pretty(&json!({
            format!("availability-zones:account={ACCOUNT}:region={REGION}"):
                ["us-east-1a", "us-east-1b", "us-east-1c"]
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join("jci.toml"),
        "[controller]\nvpc_cidr = \"10.0.0.0/16\"\n\n[agent]\nroot_volume_gib = 200\n",
    )
    .unwrap();
}

fn read_template(dir: &Path, stack: &str) -> Value {
    let text = std::fs::read_to_string(dir.join(format!("{stack}.template.json"))).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn synth_happy_path() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    write_inputs(workdir.path());
    let outdir = workdir.path().join("cdk.out");

    let settings = AppSettings::load(&workdir.path().join("jci.toml")).unwrap();
    let context = Context::load(&workdir.path().join("cdk.context.json")).unwrap();
    let built = build_app(&settings, Environment::new(ACCOUNT, REGION), context).unwrap();

    let assembly = built.app.synth().unwrap();
    assert!(assembly.missing().is_empty());
    assembly.write(&outdir).unwrap();

    // Manifest
    let manifest = AssemblyManifest::load(&outdir).unwrap();
    let ids: Vec<_> = manifest.artifacts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![CONTROLLER_STACK, AGENT_STACK]);
    let agent = manifest.artifact(AGENT_STACK).unwrap();
    assert_eq!(agent.dependencies, vec![CONTROLLER_STACK.to_string()]);
    assert_eq!(agent.environment, format!("aws://{ACCOUNT}/{REGION}"));

    // Offline validation
    let report = jci_assembly_validate::validate(&outdir).unwrap();
    assert_eq!(report.templates, 2);
    assert_eq!(report.imports, 3);

    // Controller
    let controller = TemplateAssertions::from_json(read_template(&outdir, CONTROLLER_STACK));
    controller.resource_count_is("AWS::EC2::Subnet", 6);
    controller.has_resource_properties(
        "AWS::EC2::Subnet",
        json!({ "AvailabilityZone": "us-east-1c", "MapPublicIpOnLaunch": true }),
    );
    controller.has_output(
        "loadbalancerurloutput",
        json!({ "Export": { "Name": "lb-url" }, "Description": "Loadbalancer url" }),
    );

    // Agent
    let agent = TemplateAssertions::from_json(read_template(&outdir, AGENT_STACK));
    agent.has_resource_properties(
        "AWS::EC2::Instance",
        json!({ "BlockDeviceMappings": [{ "Ebs": { "VolumeSize": 200 } }] }),
    );
    let (_, host) = agent.only_resource("AWS::EC2::Host");
    let zone = &host["Properties"]["AvailabilityZone"]["Fn::ImportValue"];
    assert!(zone.as_str().unwrap().starts_with("JenkinsStack:ExportsOutputFnGetAtt"));
}

#[test]
fn synth_is_deterministic() {
    let settings = AppSettings::default();
    let first = build_app(&settings, Environment::agnostic(), Context::new())
        .unwrap()
        .app
        .synth()
        .unwrap();
    let second = build_app(&settings, Environment::agnostic(), Context::new())
        .unwrap()
        .app
        .synth()
        .unwrap();
    for (a, b) in first.stacks().iter().zip(second.stacks()) {
        assert_eq!(a.template_hash, b.template_hash);
    }
}
