use synth_components::cegis::cegis;
use synth_components::component::{self, add, greater, greater_or_equal, var};
use synth_components::dag::{DagConfig, DagSynthesizer};
use synth_components::tree::{TreeConfig, TreeSynthesizer};
use synth_components::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = z3::Config::new();
    config.set_model_generation(true);

    let context = z3::Context::new(&config);

    let problems: Vec<(&str, fn(&z3::Context) -> Result<Option<Synthesized>, Error>)> = vec![
        ("sum", sum as _),
        ("greater", greater_than as _),
        ("sum, not x + y", sum_reordered as _),
    ];

    for (name, p) in problems {
        println!("========== {} ==========", name);
        let then = std::time::Instant::now();
        let found = p(&context)?;
        let elapsed = then.elapsed();

        println!(
            "\nElapsed:\n\n{}.{:03}s\n",
            elapsed.as_secs(),
            elapsed.subsec_millis()
        );
        match found {
            Some(found) => println!("Synthesized:\n\n{}\n", found),
            None => println!("No program\n"),
        }
    }
    Ok(())
}

fn x() -> Variable {
    Variable::program("x", Type::Int)
}

fn y() -> Variable {
    Variable::program("y", Type::Int)
}

fn sample(x_value: i64, y_value: i64, output: Node) -> TestCase {
    TestCase::new(
        vec![(x(), Node::int(x_value)), (y(), Node::int(y_value))],
        output,
    )
}

fn sums() -> Vec<TestCase> {
    vec![
        sample(1, 1, Node::int(2)),
        sample(1, 2, Node::int(3)),
        sample(7, -3, Node::int(4)),
    ]
}

fn sum(context: &z3::Context) -> Result<Option<Synthesized>, Error> {
    let library = Library::new()
        .with(var("x", Type::Int), 1)
        .with(var("y", Type::Int), 1)
        .with(add(), 1)
        .with(component::sub(), 1);
    let mut synthesizer =
        DagSynthesizer::new(Z3Solver::new(context), library, DagConfig::default());
    cegis(&mut synthesizer, &sums())
}

fn greater_than(context: &z3::Context) -> Result<Option<Synthesized>, Error> {
    let library = Library::new()
        .with(var("x", Type::Int), 1)
        .with(var("y", Type::Int), 1)
        .with(greater(), 1)
        .with(greater_or_equal(), 1);
    let mut synthesizer = DagSynthesizer::new(
        Z3Solver::new(context),
        library,
        DagConfig::default().with_locations(dag::LocationSort::BitVector),
    );
    let suite = vec![
        sample(2, 1, Node::bool(true)),
        sample(1, 2, Node::bool(false)),
        sample(1, 1, Node::bool(false)),
    ];
    cegis(&mut synthesizer, &suite)
}

fn sum_reordered(context: &z3::Context) -> Result<Option<Synthesized>, Error> {
    let x = std::rc::Rc::new(Component::new(var("x", Type::Int))?);
    let y = std::rc::Rc::new(Component::new(var("y", Type::Int))?);
    let plus = std::rc::Rc::new(Component::new(add())?);
    let forbidden = Program::app(plus, vec![Program::leaf(x)?, Program::leaf(y)?])?;

    let library = Library::new()
        .with(var("x", Type::Int), 1)
        .with(var("y", Type::Int), 1)
        .with(add(), 1);
    let mut synthesizer = TreeSynthesizer::new(
        Z3Solver::new(context),
        library,
        TreeConfig::default().with_forbidden(vec![forbidden]),
    );
    cegis(&mut synthesizer, &sums())
}
