use crate::sampler::Point;

/// Режим взаимодействия с поверхностью
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Drawing,
    Panning,
}

/// Клавиша; панорамирование слушает только пробел
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Other,
}

/// Сырой ввод указателя и клавиатуры
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    PointerLeave,
    KeyDown(Key),
    KeyUp(Key),
}

/// Эффекты перехода; машина никого не вызывает сама
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Указатель двигается без рисования (присутствие)
    CursorMoved(Point),
    /// Отрезок штриха от предыдущего сэмпла к текущему
    Stroke { from: Point, to: Point },
    /// Инкрементальный сдвиг камеры
    Pan { dx: f64, dy: f64 },
}

/// Машина Idle/Drawing/Panning. Чистая функция перехода:
/// состояние меняется только здесь, события обрабатываются по одному
/// в порядке поступления.
#[derive(Debug, Clone)]
pub struct WhiteboardMachine {
    mode: InteractionMode,
    offset: Point,
    start_pos: Point,
    pan_anchor: Option<Point>,
    panning_intent: bool,
    last_pointer: Option<Point>,
}

impl Default for WhiteboardMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteboardMachine {
    pub fn new() -> Self {
        Self {
            mode: InteractionMode::Idle,
            offset: Point::default(),
            start_pos: Point::default(),
            pan_anchor: None,
            panning_intent: false,
            last_pointer: None,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Накопленный сдвиг камеры
    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn start_pos(&self) -> Point {
        self.start_pos
    }

    pub fn pan_anchor(&self) -> Option<Point> {
        self.pan_anchor
    }

    pub fn handle(&mut self, event: InputEvent) -> Vec<Effect> {
        match self.mode {
            InteractionMode::Idle => self.handle_idle(event),
            InteractionMode::Drawing => self.handle_drawing(event),
            InteractionMode::Panning => self.handle_panning(event),
        }
    }

    fn handle_idle(&mut self, event: InputEvent) -> Vec<Effect> {
        match event {
            InputEvent::PointerDown(p) if !self.panning_intent => {
                self.mode = InteractionMode::Drawing;
                self.start_pos = Point::new(p.x - self.offset.x, p.y - self.offset.y);
                self.last_pointer = Some(p);
                vec![]
            }
            InputEvent::PointerMove(p) => vec![Effect::CursorMoved(p)],
            InputEvent::KeyDown(Key::Space) => {
                self.panning_intent = true;
                self.mode = InteractionMode::Panning;
                vec![]
            }
            // Снимаем взведённый пан, иначе клик после одиночного
            // нажатия пробела никогда не начнёт рисовать
            InputEvent::KeyUp(Key::Space) => {
                self.panning_intent = false;
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_drawing(&mut self, event: InputEvent) -> Vec<Effect> {
        match event {
            InputEvent::PointerMove(p) => {
                self.offset = Point::new(p.x - self.start_pos.x, p.y - self.start_pos.y);
                let from = self.last_pointer.unwrap_or(p);
                self.last_pointer = Some(p);
                vec![Effect::Stroke { from, to: p }]
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => {
                self.mode = InteractionMode::Idle;
                self.start_pos = Point::default();
                self.last_pointer = None;
                vec![]
            }
            // Пробел посреди штриха только взводит пан; в Panning
            // не переходим до конца штриха
            InputEvent::KeyDown(Key::Space) => {
                self.panning_intent = true;
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_panning(&mut self, event: InputEvent) -> Vec<Effect> {
        match event {
            InputEvent::PointerDown(p) => {
                self.pan_anchor = Some(p);
                vec![]
            }
            InputEvent::PointerMove(p) => match self.pan_anchor {
                Some(anchor) => {
                    let dx = p.x - anchor.x;
                    let dy = p.y - anchor.y;
                    self.offset = Point::new(self.offset.x + dx, self.offset.y + dy);
                    self.pan_anchor = Some(p);
                    vec![Effect::Pan { dx, dy }]
                }
                None => {
                    self.pan_anchor = Some(p);
                    vec![]
                }
            },
            InputEvent::PointerUp => {
                self.pan_anchor = None;
                vec![]
            }
            InputEvent::KeyUp(Key::Space) => {
                self.mode = InteractionMode::Idle;
                self.panning_intent = false;
                self.pan_anchor = None;
                vec![]
            }
            _ => vec![],
        }
    }
}
