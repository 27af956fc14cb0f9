use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ffn_layers_rust::{FeedForward, FfnConfig, FfnError, FfnKind, StateDict, Tensor, WeightType};

/// Build a feed-forward sublayer and run it on a seeded random batch
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON layer config, overrides the shape flags below
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FfnKind::Mlp)]
    kind: FfnKind,

    #[arg(long, default_value_t = 16)]
    in_features: usize,

    #[arg(long, default_value_t = 64)]
    intermediate_features: usize,

    /// Activation name (relu, gelu, silu, ...), defaults per kind
    #[arg(long)]
    activation_fn: Option<String>,

    /// Use additive bias, defaults to true for mlp and false for glu
    #[arg(long)]
    bias: Option<bool>,

    #[arg(long, value_enum, default_value_t = WeightType::F32)]
    weight_type: WeightType,

    /// Seed for parameter init and for the random input
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Load parameters from a JSON state dict
    #[arg(long)]
    state_dict: Option<PathBuf>,

    /// Write the layer parameters to a JSON state dict
    #[arg(long)]
    save_state_dict: Option<PathBuf>,

    /// Number of input rows
    #[arg(long, default_value_t = 4)]
    rows: usize,

    /// Print the output tensor as JSON
    #[arg(long)]
    print_output: bool,
}

impl Cli {
    fn layer_config(&self) -> Result<FfnConfig, FfnError> {
        if let Some(path) = &self.config {
            return FfnConfig::from_json_file(path);
        }
        Ok(FfnConfig {
            kind: self.kind,
            in_features: self.in_features,
            intermediate_features: self.intermediate_features,
            activation_fn: self.activation_fn.clone(),
            bias: self.bias,
            weight_type: self.weight_type,
            seed: self.seed,
        })
    }
}

/// Uniform [-1, 1) batch of shape [rows, in_features], seeded from the layer config
fn random_input(config: &FfnConfig, rows: usize) -> Result<Tensor, FfnError> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let data: Vec<f32> = (0..rows * config.in_features)
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();
    Ok(Tensor::from_f32("input", vec![rows, config.in_features], data)?)
}

fn run(cli: &Cli) -> Result<(), FfnError> {
    let config = cli.layer_config()?;
    let mut layer = FeedForward::from_config(&config)?;

    if let Some(path) = &cli.state_dict {
        layer.load_state_dict(&StateDict::from_json_file(path)?)?;
        info!("Parameters: {}", layer.named_parameters().join(", "));
    }

    if let Some(path) = &cli.save_state_dict {
        layer.state_dict().to_json_file(path)?;
        info!("Saved state dict to {}", path.display());
    }

    let input = random_input(&config, cli.rows)?;

    let output = layer.forward(&input)?;
    let data = output.expect_f32()?;
    let checksum: f64 = data.iter().map(|&v| v as f64).sum();
    info!(
        "{:?} forward: {:?} -> {:?}, checksum {:.6}",
        layer.kind(),
        input.dimensions(),
        output.dimensions(),
        checksum
    );

    if cli.print_output {
        let json = serde_json::json!({
            "shape": output.dimensions(),
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
