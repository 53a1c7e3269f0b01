use serde::{Deserialize, Serialize};

use crate::content::{ArchivedMotion, CompoundDesc, GridDesc, MotionNodeDesc};
use crate::scene::Point;

/// Capability shared by every motion controller variant.
pub trait MotionPlanner {
    fn attach_object(&mut self, object_id: i32);
    fn detach_all_objects(&mut self);
    fn attached_objects(&self) -> &[i32];
    fn find_path(&self, from: Point, to: Point) -> Option<Vec<Point>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub width: u32,
    pub height: u32,
    pub cell_size: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            cell_size: 20,
        }
    }
}

impl GridSettings {
    fn with_overrides(self, desc: GridDesc) -> Self {
        Self {
            width: desc.width.unwrap_or(self.width),
            height: desc.height.unwrap_or(self.height),
            cell_size: desc.cell_size.unwrap_or(self.cell_size).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MotionController {
    Graph(MovementGraph),
    Compound(CompoundController),
}

impl MotionController {
    pub fn as_graph(&self) -> Option<&MovementGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            Self::Compound(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundController> {
        match self {
            Self::Compound(compound) => Some(compound),
            Self::Graph(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Graph(_) => "graph",
            Self::Compound(_) => "compound",
        }
    }

    fn planner(&self) -> &dyn MotionPlanner {
        match self {
            Self::Graph(graph) => graph,
            Self::Compound(compound) => compound,
        }
    }

    fn planner_mut(&mut self) -> &mut dyn MotionPlanner {
        match self {
            Self::Graph(graph) => graph,
            Self::Compound(compound) => compound,
        }
    }
}

impl MotionPlanner for MotionController {
    fn attach_object(&mut self, object_id: i32) {
        self.planner_mut().attach_object(object_id);
    }

    fn detach_all_objects(&mut self) {
        self.planner_mut().detach_all_objects();
    }

    fn attached_objects(&self) -> &[i32] {
        self.planner().attached_objects()
    }

    fn find_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        self.planner().find_path(from, to)
    }
}

fn attach_unique(attached: &mut Vec<i32>, object_id: i32) {
    if !attached.contains(&object_id) {
        attached.push(object_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub id: i32,
    pub position: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLink {
    pub from: i32,
    pub to: i32,
}

/// Node/link walk graph; links are bidirectional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementGraph {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    attached: Vec<i32>,
}

impl MovementGraph {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        Self {
            nodes,
            links,
            attached: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    fn nearest_node(&self, point: Point) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .min_by_key(|(_, node)| distance_squared(node.position, point))
            .map(|(index, _)| index)
    }

    fn node_index(&self, id: i32) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    fn shortest_node_path(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let count = self.nodes.len();
        let mut best = vec![f64::INFINITY; count];
        let mut parent = vec![None::<usize>; count];
        let mut done = vec![false; count];
        best[start] = 0.0;

        loop {
            let current = (0..count)
                .filter(|index| !done[*index] && best[*index].is_finite())
                .min_by(|a, b| best[*a].total_cmp(&best[*b]))?;
            if current == goal {
                break;
            }
            done[current] = true;

            for link in &self.links {
                let neighbor = if self.node_index(link.from) == Some(current) {
                    self.node_index(link.to)
                } else if self.node_index(link.to) == Some(current) {
                    self.node_index(link.from)
                } else {
                    None
                };
                let Some(neighbor) = neighbor else {
                    continue;
                };
                let length = (distance_squared(
                    self.nodes[current].position,
                    self.nodes[neighbor].position,
                ) as f64)
                    .sqrt();
                let candidate = best[current] + length;
                if candidate < best[neighbor] {
                    best[neighbor] = candidate;
                    parent[neighbor] = Some(current);
                }
            }
        }

        let mut cursor = goal;
        let mut path = vec![cursor];
        while cursor != start {
            cursor = parent[cursor]?;
            path.push(cursor);
        }
        path.reverse();
        Some(path)
    }
}

impl MotionPlanner for MovementGraph {
    fn attach_object(&mut self, object_id: i32) {
        attach_unique(&mut self.attached, object_id);
    }

    fn detach_all_objects(&mut self) {
        self.attached.clear();
    }

    fn attached_objects(&self) -> &[i32] {
        &self.attached
    }

    fn find_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        let start = self.nearest_node(from)?;
        let goal = self.nearest_node(to)?;
        let node_path = self.shortest_node_path(start, goal)?;
        let mut waypoints = node_path
            .into_iter()
            .map(|index| self.nodes[index].position)
            .collect::<Vec<_>>();
        waypoints.push(to);
        Some(waypoints)
    }
}

fn distance_squared(a: Point, b: Point) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionZone {
    points: Vec<Point>,
}

impl ReactionZone {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Even-odd rule; zones with fewer than three points contain nothing.
    pub fn contains(&self, point: Point) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let (px, py) = (point.x as f64, point.y as f64);
        let mut inside = false;
        let mut previous = self.points[self.points.len() - 1];
        for current in &self.points {
            let (xi, yi) = (current.x as f64, current.y as f64);
            let (xj, yj) = (previous.x as f64, previous.y as f64);
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            previous = *current;
        }
        inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellCoord {
    x: u32,
    y: u32,
}

/// Cell grid over the scene area; cells outside the reaction zone (when one is
/// adopted) are blocked.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionGrid {
    settings: GridSettings,
    columns: u32,
    rows: u32,
    walkable: Vec<bool>,
}

/// Larger authored extents are clamped.
pub const MAX_GRID_EXTENT: u32 = 16_384;
pub const MAX_GRID_CELLS_PER_AXIS: u32 = 1_024;

impl MotionGrid {
    pub fn new(settings: GridSettings, zone: Option<&ReactionZone>) -> Self {
        let settings = GridSettings {
            width: settings.width.min(MAX_GRID_EXTENT),
            height: settings.height.min(MAX_GRID_EXTENT),
            cell_size: settings.cell_size.max(1),
        };
        let columns = settings
            .width
            .div_ceil(settings.cell_size)
            .clamp(1, MAX_GRID_CELLS_PER_AXIS);
        let rows = settings
            .height
            .div_ceil(settings.cell_size)
            .clamp(1, MAX_GRID_CELLS_PER_AXIS);
        let mut walkable = Vec::with_capacity(columns as usize * rows as usize);
        for y in 0..rows {
            for x in 0..columns {
                let center = cell_center(settings, CellCoord { x, y });
                walkable.push(zone.map_or(true, |zone| zone.contains(center)));
            }
        }
        Self {
            settings,
            columns,
            rows,
            walkable,
        }
    }

    pub fn settings(&self) -> GridSettings {
        self.settings
    }

    pub fn is_walkable_at(&self, point: Point) -> bool {
        self.point_to_cell(point)
            .map(|cell| self.is_walkable(cell))
            .unwrap_or(false)
    }

    fn point_to_cell(&self, point: Point) -> Option<CellCoord> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        let x = point.x as u32 / self.settings.cell_size;
        let y = point.y as u32 / self.settings.cell_size;
        if x >= self.columns || y >= self.rows {
            return None;
        }
        Some(CellCoord { x, y })
    }

    fn index_of(&self, cell: CellCoord) -> Option<usize> {
        if cell.x >= self.columns || cell.y >= self.rows {
            return None;
        }
        Some(cell.y as usize * self.columns as usize + cell.x as usize)
    }

    fn is_walkable(&self, cell: CellCoord) -> bool {
        self.index_of(cell)
            .and_then(|index| self.walkable.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn find_path_cells(&self, start: CellCoord, goal: CellCoord) -> Option<Vec<CellCoord>> {
        let start_index = self.index_of(start)?;
        let goal_index = self.index_of(goal)?;
        if !self.is_walkable(start) || !self.is_walkable(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let node_count = self.columns as usize * self.rows as usize;
        let mut closed = vec![false; node_count];
        let mut best_g = vec![u32::MAX; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = Vec::new();
        let mut next_insertion = 0u64;

        let start_h = manhattan_distance(start, goal);
        open.push(OpenNode {
            cell: start,
            h_cost: start_h,
            f_cost: start_h,
            insertion_order: next_insertion,
        });
        next_insertion = next_insertion.saturating_add(1);
        best_g[start_index] = 0;

        while !open.is_empty() {
            let best_index = pick_best_open_node_index(&open);
            let current = open.swap_remove(best_index);
            let Some(current_index) = self.index_of(current.cell) else {
                continue;
            };
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            if current.cell == goal {
                return reconstruct_cell_path(&parent, self.columns, start_index, goal_index);
            }

            let current_g = best_g[current_index];
            for neighbor in self.neighbors(current.cell).into_iter().flatten() {
                let Some(neighbor_index) = self.index_of(neighbor) else {
                    continue;
                };
                if closed[neighbor_index] || !self.is_walkable(neighbor) {
                    continue;
                }

                let tentative_g = current_g.saturating_add(1);
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }

                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                let h_cost = manhattan_distance(neighbor, goal);
                open.push(OpenNode {
                    cell: neighbor,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                    insertion_order: next_insertion,
                });
                next_insertion = next_insertion.saturating_add(1);
            }
        }

        None
    }

    fn neighbors(&self, cell: CellCoord) -> [Option<CellCoord>; 4] {
        let south = (cell.y + 1 < self.rows).then(|| CellCoord {
            x: cell.x,
            y: cell.y + 1,
        });
        let east = (cell.x + 1 < self.columns).then(|| CellCoord {
            x: cell.x + 1,
            y: cell.y,
        });
        let north = cell.y.checked_sub(1).map(|y| CellCoord { x: cell.x, y });
        let west = cell.x.checked_sub(1).map(|x| CellCoord { x, y: cell.y });
        [south, east, north, west]
    }

    pub fn find_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        let start = self.point_to_cell(from)?;
        let goal = self.point_to_cell(to)?;
        let cells = self.find_path_cells(start, goal)?;
        let mut waypoints = cells
            .iter()
            .skip(1)
            .map(|cell| cell_center(self.settings, *cell))
            .collect::<Vec<_>>();
        waypoints.pop();
        waypoints.push(to);
        Some(waypoints)
    }
}

fn cell_center(settings: GridSettings, cell: CellCoord) -> Point {
    let size = u64::from(settings.cell_size);
    let half = size / 2;
    let axis = |index: u32| {
        i32::try_from(u64::from(index) * size + half).unwrap_or(i32::MAX)
    };
    Point::new(axis(cell.x), axis(cell.y))
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    cell: CellCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, u32, u32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.cell.y,
        node.cell.x,
        node.insertion_order,
    )
}

fn reconstruct_cell_path(
    parent: &[Option<usize>],
    columns: u32,
    start_index: usize,
    goal_index: usize,
) -> Option<Vec<CellCoord>> {
    let mut cursor = goal_index;
    let mut indices = vec![cursor];
    while cursor != start_index {
        cursor = parent.get(cursor).and_then(|value| *value)?;
        indices.push(cursor);
    }
    indices.reverse();
    Some(
        indices
            .into_iter()
            .map(|index| CellCoord {
                x: (index as u32) % columns,
                y: (index as u32) / columns,
            })
            .collect(),
    )
}

fn manhattan_distance(a: CellCoord, b: CellCoord) -> u32 {
    a.x.abs_diff(b.x).saturating_add(a.y.abs_diff(b.y))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundItem {
    pub reaction_zone: Option<ReactionZone>,
    pub grid: Option<MotionGrid>,
}

/// Set of grid controllers, each optionally bounded by a reaction zone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundController {
    items: Vec<CompoundItem>,
    attached: Vec<i32>,
}

impl CompoundController {
    pub fn new(items: Vec<CompoundItem>) -> Self {
        Self {
            items,
            attached: Vec::new(),
        }
    }

    pub fn items(&self) -> &[CompoundItem] {
        &self.items
    }
}

impl MotionPlanner for CompoundController {
    fn attach_object(&mut self, object_id: i32) {
        attach_unique(&mut self.attached, object_id);
    }

    fn detach_all_objects(&mut self) {
        self.attached.clear();
    }

    fn attached_objects(&self) -> &[i32] {
        &self.attached
    }

    fn find_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        self.items
            .iter()
            .filter(|item| {
                item.reaction_zone
                    .as_ref()
                    .map_or(true, |zone| zone.contains(from))
            })
            .filter_map(|item| item.grid.as_ref())
            .find_map(|grid| grid.find_path(from, to))
    }
}

/// Builds a compound controller from document-ordered children. A reaction
/// zone immediately followed by a grid becomes that grid's walkability mask;
/// a grid without a preceding zone is built unmasked.
pub fn build_from_document(desc: &CompoundDesc, defaults: GridSettings) -> MotionController {
    let mut items = Vec::with_capacity(desc.declared_children);
    let mut cursor = desc.children.iter().peekable();

    for _ in 0..desc.declared_children {
        let mut item = CompoundItem::default();
        match cursor.next() {
            Some(MotionNodeDesc::ReactionZone(points)) => {
                let zone = ReactionZone::new(points.clone());
                if let Some(MotionNodeDesc::Grid(grid)) = cursor.peek() {
                    item.grid = Some(MotionGrid::new(
                        defaults.with_overrides(*grid),
                        Some(&zone),
                    ));
                    cursor.next();
                }
                item.reaction_zone = Some(zone);
            }
            Some(MotionNodeDesc::Grid(grid)) => {
                item.grid = Some(MotionGrid::new(defaults.with_overrides(*grid), None));
            }
            Some(MotionNodeDesc::Other(_)) | None => {}
        }
        items.push(item);
    }

    MotionController::Compound(CompoundController::new(items))
}

pub fn build_from_archive(motion: &ArchivedMotion, defaults: GridSettings) -> MotionController {
    match motion {
        ArchivedMotion::Graph { nodes, links } => MotionController::Graph(MovementGraph::new(
            nodes
                .iter()
                .map(|node| GraphNode {
                    id: node.id,
                    position: node.position,
                })
                .collect(),
            links
                .iter()
                .map(|link| GraphLink {
                    from: link.from,
                    to: link.to,
                })
                .collect(),
        )),
        ArchivedMotion::Compound { items } => MotionController::Compound(CompoundController::new(
            items
                .iter()
                .map(|item| {
                    let zone = item.zone.clone().map(ReactionZone::new);
                    let grid = item.grid.map(|grid| {
                        MotionGrid::new(defaults.with_overrides(grid), zone.as_ref())
                    });
                    CompoundItem {
                        reaction_zone: zone,
                        grid,
                    }
                })
                .collect(),
        )),
    }
}
