use kube::core::CustomResourceExt;
use netcheck_models::ProbeJob;

fn main() {
    let crd = ProbeJob::crd();
    let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
    println!("{}", yaml);
}
