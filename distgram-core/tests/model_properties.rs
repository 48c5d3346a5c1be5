use distgram_core::model::config::{CompletionInput, ContextWindow, ModelConfig};
use distgram_core::model::relation_model::RelationModel;

const EPSILON: f64 = 1e-6;

fn model(token_length: usize, context: ContextWindow) -> RelationModel {
	RelationModel::new(ModelConfig { token_length, context, ..Default::default() }).unwrap()
}

#[test]
fn test_abab_predicts_b_with_two_observations() {
	let mut model = model(1, ContextWindow::Unbounded);
	model.train("abab");

	assert_eq!(model.next("a", 5), vec!["b"]);
	let scored = model.next_scored("a", 5);
	assert!((scored[0].1 - 2.0 * EPSILON).abs() < 1e-12);
	assert_eq!(model.tree().count("a", 1, "b"), 2);
}

#[test]
fn test_weights_are_monotonic() {
	let mut model = model(2, ContextWindow::Bounded(4));
	let corpus = ["the quick brown fox", "jumps over the lazy dog", "the quick brown fox"];

	let mut previous: Vec<(String, usize, String, f64)> = Vec::new();
	for text in corpus {
		model.train(text);
		for (source, distance, destination, weight) in &previous {
			assert!(model.weight(source, *distance, destination) >= *weight);
		}
		previous = model
			.tree()
			.iter()
			.map(|(s, d, t, _)| (s.to_owned(), d, t.to_owned(), model.weight(s, d, t)))
			.collect();
	}
}

#[test]
fn test_no_distance_beyond_window() {
	for window in [1, 2, 5] {
		let mut model = model(1, ContextWindow::Bounded(window));
		model.train("a long enough sentence to exceed every window");
		assert_eq!(model.tree().max_distance(), Some(window));
		assert!(model.tree().iter().all(|(_, distance, _, _)| distance <= window));
	}
}

#[test]
fn test_unbounded_window_records_whole_fragment() {
	let mut model = model(1, ContextWindow::Unbounded);
	model.train("abcdefghij");
	assert_eq!(model.tree().max_distance(), Some(9));
	assert_eq!(model.tree().count("a", 9, "j"), 1);
}

#[test]
fn test_greedy_completion_is_repeatable() {
	let mut model = model(2, ContextWindow::Bounded(10));
	model.train("turkey is a country. turkey has a long history. the ottoman empire ruled turkey.");

	let input = CompletionInput::new(30, 5, false);
	let outputs: Vec<String> = (0..3).map(|_| model.complete("turkey", &input)).collect();
	assert!(outputs.windows(2).all(|w| w[0] == w[1]));
	assert!(outputs[0].starts_with("turkey"));
}

#[test]
fn test_completion_never_exceeds_length() {
	let mut model = model(1, ContextWindow::Unbounded);
	model.train(&"ab".repeat(50));

	for length in [0, 1, 7, 20] {
		let out = model.complete("a", &CompletionInput::new(length, 5, false));
		assert_eq!(out.chars().count(), 1 + length);
	}
}

#[test]
fn test_completion_stops_exactly_when_next_is_empty() {
	let mut model = model(1, ContextWindow::Unbounded);
	model.train("xyz");

	let out = model.complete("x", &CompletionInput::new(10, 5, false));
	assert_eq!(out, "xyz");
	assert!(model.next(&out, 5).is_empty());
	assert!(!model.next("xy", 5).is_empty());
}

#[test]
fn test_tie_follows_first_insertion() {
	let mut model = model(1, ContextWindow::Unbounded);
	// "q" sees "m" and "k" once each at distance 1.
	model.train("qm");
	model.train("qk");
	let scored = model.next_scored("q", 5);
	assert_eq!(scored[0].1, scored[1].1);
	assert_eq!(model.next("q", 5), vec!["m", "k"]);
}

#[test]
fn test_chunked_stream_omits_boundary_pairs() {
	let config = ModelConfig {
		token_length: 1,
		context: ContextWindow::Unbounded,
		chunk_size: 1,
		..Default::default()
	};
	let mut streamed = RelationModel::new(config.clone()).unwrap();
	streamed
		.load_and_train(vec![Ok("ab".to_owned()), Ok("cd".to_owned())])
		.unwrap();

	for (source, distance, destination) in [("b", 1, "c"), ("a", 2, "c"), ("a", 3, "d"), ("b", 2, "d")] {
		assert_eq!(streamed.weight(source, distance, destination), 0.0);
	}

	let mut whole = RelationModel::new(config).unwrap();
	whole.train("abcd");
	assert!((whole.weight("b", 1, "c") - EPSILON).abs() < 1e-12);
	assert!((whole.weight("a", 3, "d") - EPSILON).abs() < 1e-12);
}
