//! Full runs over a temporary manifest tree, offline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kval_cli::{run, OutputFormat, Settings, EXIT_INVALID, EXIT_OK};
use kval_openapi::providers::KubeConfigOverrides;
use serde_json::Value;

const GOOD: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: good\ndata:\n  key: value\n";
const BAD: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: bad\ndata:\n  key: 1\n";

fn settings(manifests: Vec<PathBuf>, output: OutputFormat) -> Settings {
    Settings {
        manifests,
        kube_version: Some("1.27".into()),
        local_schemas: None,
        local_crds: None,
        schema_patches: None,
        output,
        // An unreadable kubeconfig and a mirror nobody listens on make both
        // remote sources fail, as they do on a machine without network.
        kube: KubeConfigOverrides {
            kubeconfig: Some(PathBuf::from("/nonexistent/kval-test-kubeconfig")),
            ..KubeConfigOverrides::default()
        },
        github_base_url: Some("http://127.0.0.1:1".into()),
        timeout: Duration::from_secs(1),
        color: false,
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run_captured(settings: &Settings) -> (u8, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = run(settings, &mut out, &mut err).unwrap();
    (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
}

const POD: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: web
  labels:
    app: web
spec:
  containers:
    - name: nginx
      image: nginx:1.25
      ports:
        - name: http
          containerPort: 80
      env:
        - name: MODE
          value: production
      resources:
        limits:
          cpu: 500m
          memory: 128Mi
      readinessProbe:
        httpGet:
          path: /healthz
          port: http
      volumeMounts:
        - name: config
          mountPath: /etc/nginx/conf.d
  volumes:
    - name: config
      configMap:
        name: nginx-config
"#;

const SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
  ports:
    - port: 80
      targetPort: 8080
"#;

#[test]
fn valid_tree_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.yaml", GOOD);
    write(dir.path(), "notes.txt", "not a manifest");

    let (code, out, err) = run_captured(&settings(vec![dir.path().to_path_buf()], OutputFormat::Human));
    assert_eq!(code, EXIT_OK);
    assert!(out.contains("good.yaml...OK"), "{out}");
    assert!(!out.contains("notes.txt"));
    assert!(err.is_empty());
}

#[test]
fn invalid_document_exits_one_and_reports_on_err() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a-good.yaml", GOOD);
    write(dir.path(), "b-bad.yaml", BAD);

    let (code, out, err) = run_captured(&settings(vec![dir.path().to_path_buf()], OutputFormat::Human));
    assert_eq!(code, EXIT_INVALID);
    let good_at = out.find("a-good.yaml...OK").unwrap();
    let bad_at = out.find("b-bad.yaml...ERROR").unwrap();
    assert!(good_at < bad_at);
    assert!(err.contains(r#"ConfigMap.core "bad" is invalid"#), "{err}");
    assert!(err.contains("data.key"));
}

#[test]
fn json_report_lists_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let multi = write(dir.path(), "multi.yaml", &format!("{GOOD}---\n---\n{BAD}"));

    let (code, out, _) = run_captured(&settings(vec![multi.clone()], OutputFormat::Json));
    assert_eq!(code, EXIT_INVALID);
    assert!(out.contains("\n    \""), "four-space indentation: {out}");

    let report: Value = serde_json::from_str(&out).unwrap();
    let statuses = report[multi.display().to_string()].as_array().unwrap();
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[0]["status"], "Success");
    assert_eq!(statuses[1]["status"], "Success");
    assert_eq!(statuses[2]["status"], "Failure");
    assert_eq!(statuses[2]["code"], 422);
    assert_eq!(statuses[2]["details"]["causes"][0]["field"], "data.key");
}

#[test]
fn missing_manifest_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");

    let (code, out, err) = run_captured(&settings(vec![missing], OutputFormat::Human));
    assert_eq!(code, EXIT_INVALID);
    assert!(out.contains("missing.yaml...ERROR"));
    assert!(err.contains("error reading file"));
}

#[test]
fn missing_crd_directory_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "good.yaml", GOOD);
    let mut settings = settings(vec![manifest], OutputFormat::Human);
    settings.local_crds = Some(dir.path().join("no-such-dir"));

    let mut out = Vec::new();
    let mut err = Vec::new();
    let error = run(&settings, &mut out, &mut err).unwrap_err();
    assert!(format!("{error:#}").starts_with("failed to set up schema sources"));
    assert!(out.is_empty());
}

#[test]
fn core_workloads_validate_without_network() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "pod.yaml", POD);
    write(dir.path(), "service.yaml", SERVICE);

    let (code, out, err) = run_captured(&settings(vec![dir.path().to_path_buf()], OutputFormat::Human));
    assert_eq!(code, EXIT_OK, "{err}");
    assert!(out.contains("pod.yaml...OK"), "{out}");
    assert!(out.contains("service.yaml...OK"), "{out}");
}

#[test]
fn invalid_pod_reports_the_container_field() {
    let dir = tempfile::tempdir().unwrap();
    let pod = write(
        dir.path(),
        "pod.yaml",
        &POD.replace("containerPort: 80", "containerPort: eighty"),
    );

    let (code, _, err) = run_captured(&settings(vec![pod], OutputFormat::Human));
    assert_eq!(code, EXIT_INVALID);
    assert!(err.contains(r#"Pod.core "web" is invalid"#), "{err}");
    assert!(err.contains("spec.containers[0].ports[0].containerPort"), "{err}");
}

#[test]
fn local_crd_resources_validate() {
    let dir = tempfile::tempdir().unwrap();
    let crds = dir.path().join("crds");
    std::fs::create_dir(&crds).unwrap();
    write(
        &crds,
        "widget.yaml",
        r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  scope: Namespaced
  names:
    plural: widgets
    singular: widget
    kind: Widget
    listKind: WidgetList
  versions:
    - name: v1
      served: true
      storage: true
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                size:
                  type: integer
                  minimum: 1
"#,
    );
    let manifests = dir.path().join("manifests");
    std::fs::create_dir(&manifests).unwrap();
    write(
        &manifests,
        "widgets.yaml",
        "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: small\nspec:\n  size: 0\n",
    );

    let mut settings = settings(vec![manifests], OutputFormat::Human);
    settings.local_crds = Some(crds);
    let (code, _, err) = run_captured(&settings);
    assert_eq!(code, EXIT_INVALID);
    assert!(err.contains(r#"Widget.example.com "small" is invalid"#), "{err}");
    assert!(err.contains("spec.size"));
}
