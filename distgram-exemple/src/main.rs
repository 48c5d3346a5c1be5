use distgram_core::model::config::{CompletionInput, ContextWindow, ModelConfig, StartSeed};
use distgram_core::model::generator::Generator;
use distgram_core::model::relation_model::RelationModel;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Two characters per token, pairs up to 10 tokens apart,
    // corpora streamed 1000 lines at a time
    let config = ModelConfig {
        token_length: 2,
        context: ContextWindow::Bounded(10),
        ..Default::default()
    };

    // Train every .dat corpus of the "data" directory
    // A .bin snapshot is written next to each corpus and reused when the
    // configuration did not change
    let generator = Generator::from_folder("./data", config.clone())?;
    println!("Loaded corpora: {}", generator.model_names().join(", "));

    // Best candidates after a context
    println!("Next after 'turkey': {:?}", generator.next("turkey", 5));

    // Greedy completion: always the top candidate, same output every run
    let input = CompletionInput::new(100, 5, false);
    println!("Greedy: {}", generator.complete("turkey", &input));

    // Random completion: uniform pick among the top 5 candidates
    let input = CompletionInput::new(100, 5, true);
    println!("Random: {}", generator.complete("turkey", &input));

    // Generation from a random base-36 seed (usually stops early, the seed
    // rarely exists in the corpus) and from a token of the model
    println!("Generated (random seed): {}", generator.generate(100, false, 5));
    for i in 0..3 {
        println!(
            "Generated (model seed) {}: {}",
            i + 1,
            generator.generate_from(&StartSeed::FromModel, &input)
        );
    }

    // A single corpus, without a generator
    let ottoman = RelationModel::load_or_train("./data/ottoman.dat", config)?;
    println!("Ottoman only: {}", ottoman.complete("os", &CompletionInput::new(40, 3, false)));

    Ok(())
}
