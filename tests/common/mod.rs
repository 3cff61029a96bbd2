#![allow(dead_code)]

use symplan::task::{Effect, FactPair, Operator, Task, Variable};

const ROOMS: [&str; 2] = ["rooma", "roomb"];
const GRIPPER: i32 = 2;

/// Single-gripper Gripper: carry `balls` balls from room A to room B.
///
/// Variables: robot position, one location per ball (A, B or held), and the
/// gripper state. Optimal cost is `4 * balls - 1`.
pub fn gripper(balls: usize) -> Task {
    let robot = 0;
    let ball = |i: usize| 1 + i;
    let free = 1 + balls;

    let mut variables = vec![Variable::new("at-robby", 2).with_fact_names(ROOMS)];
    for i in 0..balls {
        variables.push(
            Variable::new(format!("ball{}", i), 3).with_fact_names([
                format!("at ball{} rooma", i),
                format!("at ball{} roomb", i),
                format!("carry ball{}", i),
            ]),
        );
    }
    variables.push(Variable::new("gripper", 2).with_fact_names(["free", "busy"]));

    let mut operators = Vec::new();
    for (from, to) in [(0, 1), (1, 0)] {
        operators.push(Operator::new(
            format!("move {} {}", ROOMS[from as usize], ROOMS[to as usize]),
            vec![FactPair::new(robot, from)],
            vec![Effect::new(FactPair::new(robot, to))],
            1,
        ));
    }
    for i in 0..balls {
        for room in 0..2 {
            operators.push(Operator::new(
                format!("pick ball{} {}", i, ROOMS[room as usize]),
                vec![
                    FactPair::new(robot, room),
                    FactPair::new(ball(i), room),
                    FactPair::new(free, 0),
                ],
                vec![
                    Effect::new(FactPair::new(ball(i), GRIPPER)),
                    Effect::new(FactPair::new(free, 1)),
                ],
                1,
            ));
            operators.push(Operator::new(
                format!("drop ball{} {}", i, ROOMS[room as usize]),
                vec![FactPair::new(robot, room), FactPair::new(ball(i), GRIPPER)],
                vec![
                    Effect::new(FactPair::new(ball(i), room)),
                    Effect::new(FactPair::new(free, 0)),
                ],
                1,
            ));
        }
    }

    let mut mutex_groups = Vec::new();
    for i in 0..balls {
        mutex_groups.push(vec![FactPair::new(ball(i), GRIPPER), FactPair::new(free, 0)]);
        for j in i + 1..balls {
            mutex_groups.push(vec![FactPair::new(ball(i), GRIPPER), FactPair::new(ball(j), GRIPPER)]);
        }
    }

    let mut initial_state = vec![0; variables.len()];
    initial_state[free] = 0;

    Task {
        variables,
        operators,
        axioms: vec![],
        initial_state,
        goal: (0..balls).map(|i| FactPair::new(ball(i), 1)).collect(),
        mutex_groups,
    }
}

/// Two binary switches, each toggled by one operator with conditional
/// effects. Toggling the first costs 1, the second costs 2.
pub fn toggles() -> Task {
    let toggle = |var: usize, cost| {
        Operator::new(
            format!("toggle-{}", var),
            vec![],
            vec![
                Effect::conditional(FactPair::new(var, 1), vec![FactPair::new(var, 0)]),
                Effect::conditional(FactPair::new(var, 0), vec![FactPair::new(var, 1)]),
            ],
            cost,
        )
    };
    Task {
        variables: vec![Variable::new("s0", 2), Variable::new("s1", 2)],
        operators: vec![toggle(0, 1), toggle(1, 2)],
        initial_state: vec![0, 0],
        goal: vec![FactPair::new(0, 1), FactPair::new(1, 1)],
        ..Task::default()
    }
}

/// The goal `y = 1` is mutex with every value `x` takes from the initial state.
pub fn unsolvable() -> Task {
    Task {
        variables: vec![Variable::new("x", 3), Variable::new("y", 2)],
        operators: vec![
            Operator::new("x01", vec![FactPair::new(0, 0)], vec![Effect::new(FactPair::new(0, 1))], 1),
            Operator::new("x10", vec![FactPair::new(0, 1)], vec![Effect::new(FactPair::new(0, 0))], 1),
            Operator::new("y1", vec![FactPair::new(1, 0)], vec![Effect::new(FactPair::new(1, 1))], 1),
        ],
        initial_state: vec![0, 0],
        goal: vec![FactPair::new(1, 1)],
        mutex_groups: vec![
            vec![FactPair::new(1, 1), FactPair::new(0, 0)],
            vec![FactPair::new(1, 1), FactPair::new(0, 1)],
        ],
        ..Task::default()
    }
}

/// `x` from 0 to 3: a free step 0 -> 1, then 1 -> 3 for 2, against a
/// direct 0 -> 3 for 3 and a free but useless 3 -> 2.
pub fn zero_cost_chain() -> Task {
    let op = |name: &str, from: i32, to: i32, cost| {
        Operator::new(name, vec![FactPair::new(0, from)], vec![Effect::new(FactPair::new(0, to))], cost)
    };
    Task {
        variables: vec![Variable::new("x", 4)],
        operators: vec![op("direct", 0, 3, 3), op("free", 0, 1, 0), op("jump", 1, 3, 2), op("back", 3, 2, 0)],
        initial_state: vec![0],
        goal: vec![FactPair::new(0, 3)],
        ..Task::default()
    }
}
