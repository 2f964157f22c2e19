use fidreg::{
    ArtifactStore, MemoryStore, PrecomputedDetector, Registrar, RegistrationConfig,
    RegistrationInputs, Transform, VolumeId,
};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <reference.fcsv> <detected.fcsv> [config.json] [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let reference = fidreg::io::load_point_set(Path::new(&args[1]))?;
    let detected = fidreg::io::load_point_set(Path::new(&args[2]))?;
    let config = match args.get(3) {
        Some(path) => RegistrationConfig::from_json_file(Path::new(path))?,
        None => RegistrationConfig::default(),
    };

    let volume = VolumeId::new(args[2].clone());
    let detector = PrecomputedDetector::new().with_result(volume.clone(), detected);
    let mut store = MemoryStore::new();
    let inputs = RegistrationInputs {
        volume: Some(volume),
        reference: Some(store.add_point_set("reference", reference)),
        output: Some(store.add_transform("output", Transform::identity())),
    };

    let outcome = Registrar::with_config(detector, config).register(&mut store, &inputs)?;
    println!(
        "Registered with RMS error {:.4} after {} ICP iterations.",
        outcome.error, outcome.iterations
    );
    for row in outcome.transform.to_row_major() {
        println!("  {:>10.5} {:>10.5} {:>10.5} {:>10.5}", row[0], row[1], row[2], row[3]);
    }

    if let Some(out_path) = args.get(4) {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
