use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tth-hist"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("tth_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn jagged(rows: &[Vec<f64>]) -> Value {
    let mut offsets = vec![0usize];
    let mut flat = Vec::new();
    for r in rows {
        flat.extend_from_slice(r);
        offsets.push(flat.len());
    }
    json!({ "flat": flat, "offsets": offsets })
}

type Event = (Vec<f64>, Vec<f64>, Vec<(f64, f64)>);

/// Shard document from per-event (electron pt, muon pt, jet (pt, score)) lists in MeV.
fn shard_json(events: &[Event], mc: bool) -> Value {
    let n = events.len();
    let mut jag = serde_json::Map::new();
    for (prefix, iso) in [("el", "ptvarcone20"), ("mu", "ptvarcone30")] {
        let pts: Vec<Vec<f64>> = events
            .iter()
            .map(|e| if prefix == "el" { e.0.clone() } else { e.1.clone() })
            .collect();
        let same = |v: f64| pts.iter().map(|r| vec![v; r.len()]).collect::<Vec<_>>();
        jag.insert(format!("{prefix}_pt"), jagged(&pts));
        jag.insert(format!("{prefix}_e"), jagged(&pts));
        for var in ["eta", "phi", "charge", "topoetcone20", iso] {
            jag.insert(format!("{prefix}_{var}"), jagged(&same(0.0)));
        }
    }
    let jet_pt: Vec<Vec<f64>> = events.iter().map(|e| e.2.iter().map(|j| j.0).collect()).collect();
    let score: Vec<Vec<f64>> = events.iter().map(|e| e.2.iter().map(|j| j.1).collect()).collect();
    let zeros: Vec<Vec<f64>> = jet_pt.iter().map(|r| vec![0.0; r.len()]).collect();
    jag.insert("jet_pt".into(), jagged(&jet_pt));
    jag.insert("jet_e".into(), jagged(&jet_pt));
    jag.insert("jet_mv2c20".into(), jagged(&score));
    for var in ["jet_eta", "jet_phi", "jet_jvt"] {
        jag.insert(var.into(), jagged(&zeros));
    }

    let mut scalars = serde_json::Map::new();
    scalars.insert("met_met".into(), json!(vec![10e3; n]));
    scalars.insert("met_phi".into(), json!(vec![0.0; n]));
    let mut doc = json!({ "jagged": jag });
    if mc {
        for w in ["weight_mc", "weight_pileup", "weight_leptonSF", "weight_bTagSF"] {
            scalars.insert(w.into(), json!(vec![1.0; n]));
        }
        doc["sum_weights"] = json!([n as f64]);
    }
    doc["scalars"] = Value::Object(scalars);
    doc
}

fn events() -> Vec<Event> {
    vec![
        // 1 e, 4 jets, 3 b-tagged
        (vec![30e3], vec![], vec![(80e3, 0.9), (60e3, 0.8), (50e3, 0.7), (40e3, -0.9)]),
        // 1 mu, 4 jets, 4 b-tagged
        (vec![], vec![40e3], vec![(70e3, 0.9); 4]),
        // no leptons
        (vec![], vec![], vec![(30e3, 0.9); 4]),
    ]
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, contents).unwrap();
    p
}

fn write_shard(dir: &Path, name: &str, events: &[Event], mc: bool) -> PathBuf {
    write(dir, name, &serde_json::to_string(&shard_json(events, mc)).unwrap())
}

fn read_json(p: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(p).unwrap()).unwrap()
}

fn hist<'a>(store: &'a Value, group: &str, name: &str) -> &'a Value {
    let g = store["groups"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["name"] == group)
        .unwrap_or_else(|| panic!("missing group {group}"));
    g["histograms"]
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["name"] == name)
        .unwrap_or_else(|| panic!("missing histogram {group}/{name}"))
}

fn integral(h: &Value) -> f64 {
    h["bin_content"].as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).sum()
}

const CONFIG: &str = "\
# ttH(bb) single lepton
Debug: false
XSFile: XS_Samples.txt
";

const XS: &str = "\
410000  2.0  0.5
";

#[test]
fn run_writes_histogram_store() {
    let dir = tmp_dir("run");
    let cfg = write(&dir, "tth.config", CONFIG);
    write(&dir, "XS_Samples.txt", XS);
    let data = write_shard(&dir, "user.x.data15_13TeV.00276262.json", &events(), false);
    let mc = write_shard(&dir, "user.x.mc15_13TeV.00410000.ttbar.json", &events(), true);
    let out_path = dir.join("out/hists.json");
    let summary_path = dir.join("summary.json");

    let out = run(&[
        "run",
        "--config",
        &s(&cfg),
        "--input",
        &s(&data),
        &s(&mc),
        "--output",
        &s(&out_path),
        "--summary",
        &s(&summary_path),
        "--threads",
        "2",
    ]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let store = read_json(&out_path);
    assert_eq!(store["groups"].as_array().unwrap().len(), 6);
    // Data contributes 1 per event, simulation xs*eff/N = 1/3.
    let n = hist(&store, "sel_el_4j_2b", "h_jet_n");
    assert!((integral(n) - 4.0 / 3.0).abs() < 1e-9);
    assert!((integral(hist(&store, "sel_mu_4j_4b", "h_bjet_n")) - 4.0 / 3.0).abs() < 1e-9);
    assert_eq!(integral(hist(&store, "sel_el_4j_4b", "h_jet_n")), 0.0);
    assert_eq!(hist(&store, "sel_el_4j_2b", "h_jet_pt_all")["n_bins"], 50);
    assert!((integral(hist(&store, "sel_el_4j_2b", "h_bjet_mv2c20_all")) - 4.0).abs() < 1e-9);

    let summary = read_json(&summary_path);
    let shards = summary["shards"].as_array().unwrap();
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0]["events"], 3);
    assert_eq!(shards[1]["sample_id"], "410000");
    assert!(summary["failures"].as_array().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_is_deterministic() {
    let dir = tmp_dir("determinism");
    let cfg = write(&dir, "tth.config", CONFIG);
    write(&dir, "XS_Samples.txt", XS);
    let data = write_shard(&dir, "user.x.data15_13TeV.00276262.json", &events(), false);
    let mc = write_shard(&dir, "user.x.mc15_13TeV.00410000.ttbar.json", &events(), true);

    let mut outputs = Vec::new();
    for tag in ["a", "b"] {
        let p = dir.join(format!("{tag}.json"));
        let out = run(&["run", "--config", &s(&cfg), "--input", &s(&data), &s(&mc), "--output", &s(&p)]);
        assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
        outputs.push(std::fs::read(&p).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failed_shard_aborts_unless_keep_going() {
    let dir = tmp_dir("keep_going");
    let cfg = write(&dir, "tth.config", CONFIG);
    write(&dir, "XS_Samples.txt", XS);
    let data = write_shard(&dir, "user.x.data15_13TeV.00276262.json", &events(), false);
    // No cross-section entry for 341270.
    let mc = write_shard(&dir, "user.x.mc15_13TeV.00341270.ttH.json", &events(), true);
    let out_path = dir.join("hists.json");

    let out = run(&["run", "--config", &s(&cfg), "--input", &s(&data), &s(&mc), "--output", &s(&out_path)]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("341270"), "stderr={stderr}");
    assert!(!out_path.exists());

    let summary_path = dir.join("summary.json");
    let out = run(&[
        "run",
        "--config",
        &s(&cfg),
        "--input",
        &s(&data),
        &s(&mc),
        "--output",
        &s(&out_path),
        "--summary",
        &s(&summary_path),
        "--keep-going",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let store = read_json(&out_path);
    assert_eq!(integral(hist(&store, "sel_el_4j_2b", "h_jet_n")), 1.0);
    let summary = read_json(&summary_path);
    assert_eq!(summary["shards"].as_array().unwrap().len(), 1);
    let failures = summary["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0]["error"].as_str().unwrap().contains("341270"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn merge_adds_stores() {
    let dir = tmp_dir("merge");
    let cfg = write(&dir, "tth.config", CONFIG);
    write(&dir, "XS_Samples.txt", XS);
    let all = events();
    let a = write_shard(&dir, "user.x.data15_13TeV.00276262.a.json", &all[..1], false);
    let b = write_shard(&dir, "user.x.data15_13TeV.00276262.b.json", &all[1..], false);

    let (ha, hb) = (dir.join("a_hists.json"), dir.join("b_hists.json"));
    for (input, output) in [(&a, &ha), (&b, &hb)] {
        let out = run(&["run", "--config", &s(&cfg), "--input", &s(input), "--output", &s(output)]);
        assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    }
    let merged = dir.join("merged.json");
    let out = run(&["merge", "--input", &s(&ha), &s(&hb), "--output", &s(&merged)]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let both = dir.join("both.json");
    let out = run(&["run", "--config", &s(&cfg), "--input", &s(&a), &s(&b), "--output", &s(&both)]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    assert_eq!(read_json(&merged), read_json(&both));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn check_config_prints_resolved_settings() {
    let dir = tmp_dir("check_config");
    let cfg = write(
        &dir,
        "tth.config",
        "BTagWP: 0.1758\n\
         Trigger: HLT_mu50, HLT_e60_lhmedium\n\
         Selection: sel_1l_4j\n\
           LepNum: 1\n\
           JetNum: 4\n\
           JetEquality: false\n",
    );
    let out = run(&["check-config", "--config", &s(&cfg)]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["btag_wp"], 0.1758);
    assert_eq!(v["triggers"], json!(["HLT_mu50", "HLT_e60_lhmedium"]));
    let sels = v["selections"].as_array().unwrap();
    assert_eq!(sels.len(), 1);
    assert_eq!(sels[0]["name"], "sel_1l_4j");
    assert_eq!(sels[0]["leptons"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_config_fails() {
    let dir = tmp_dir("bad_config");
    let out = run(&["check-config", "--config", &s(&dir.join("absent.config"))]);
    assert!(!out.status.success());
    let cfg = write(&dir, "tth.config", "BTagWP: tight\n");
    let out = run(&["check-config", "--config", &s(&cfg)]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("line 1"));

    let _ = std::fs::remove_dir_all(&dir);
}
