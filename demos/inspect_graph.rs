#![allow(missing_docs)]

fn main() -> refgraph::Result<()> {
    use refgraph::{Model, PayloadInspector, RefGraph, Shared};

    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    println!("=== REFGRAPH INSPECT DEMO ===");

    #[derive(Debug, Default, Model)]
    struct Employee {
        name: String,
        manager: Option<Shared<Employee>>,
        reports: Vec<Shared<Employee>>,
    }

    // ------------------------------------------------------------------
    // An org chart: everyone points up, the boss points down.
    // ------------------------------------------------------------------
    let boss = Shared::new(Employee {
        name: "Boss".into(),
        ..Employee::default()
    });
    for name in ["Ana", "Ben", "Cid"] {
        let report = Shared::new(Employee {
            name: name.into(),
            manager: Some(boss.clone()),
            reports: Vec::new(),
        });
        boss.borrow_mut().reports.push(report);
    }

    let dir = std::env::temp_dir().join("refgraph_demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("org_chart.rgf");

    RefGraph::save(&path, &boss.handle())?;
    println!("{}", PayloadInspector::inspect(&path)?);

    let loaded: Shared<Employee> = RefGraph::load(&path)?;
    for report in &loaded.borrow().reports {
        let manager = report.borrow().manager.clone().expect("Missing manager");
        assert!(manager.ptr_eq(&loaded));
    }
    println!(">> {} reports point back at the same boss", loaded.borrow().reports.len());

    // Break the cycles so both graphs are freed.
    boss.borrow_mut().reports.clear();
    loaded.borrow_mut().reports.clear();
    std::fs::remove_file(&path)?;
    Ok(())
}
