//! Trains a 2 → 10 → 1 network to tell whether a point lies inside a circle
//! of radius 10 centred on the origin.
//!
//! Run with `cargo run --release --example circle`. Set `RUST_LOG=debug` for
//! pool and training details.

use dense_mlp::nn::{Activation, Cost, Dataset, MultilayerPerceptron, Sample, TrainConfig};
use dense_mlp::{shutdown_default, Matrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> dense_mlp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    const SAMPLES: usize = 1000;
    const RADIUS: f64 = 10.0;

    let mut rng = StdRng::seed_from_u64(2024);

    // points in [-20, 20)², labelled 1 inside the circle
    let samples = (0..SAMPLES)
        .map(|_| {
            let a: f64 = rng.random_range(-20.0..20.0);
            let b: f64 = rng.random_range(-20.0..20.0);
            let label = if a * a + b * b < RADIUS * RADIUS { 1.0 } else { 0.0 };
            Sample::new(vec![a, b], label)
        })
        .collect();
    let (train, test) = Dataset::new(samples)?.partition(0.8)?;

    let mut model = MultilayerPerceptron::new(2, Cost::L2)?;
    model
        .add_layer(10, Activation::LeakyReLU, &mut rng)?
        .add_layer(1, Activation::LogisticSigmoid, &mut rng)?;

    let config = TrainConfig {
        epochs: 200,
        learning_rate: 0.01,
        batch_size: 32,
        seed: 7,
    };
    let reports = model.train(&train, test.as_ref(), &config)?;

    if let Some(last) = reports.last() {
        println!(
            "final: cost {:.4}, accuracy {:.3}",
            last.cost, last.accuracy
        );
        if let Some(v) = last.validation {
            println!("validation: cost {:.4}, accuracy {:.3}", v.cost, v.accuracy);
        }
    }

    let probe = Matrix::from_rows(&[[0.0, 15.0], [0.0, 0.0]])?;
    println!("p(inside) for (0,0) and (15,0):\n{}", model.predict(&probe)?);

    shutdown_default();
    Ok(())
}
